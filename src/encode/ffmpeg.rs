use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{VideoEncoder, FRAME_INDEX_DIGITS};
use crate::error::{ExportError, Result};

static WORK_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

const OUTPUT_NAME: &str = "output.mp4";

/// Codec settings handed to ffmpeg.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    pub codec: String,
    pub pix_fmt: String,
    /// H.264 CRF (0-51, lower is better). Ignored when `bitrate` is set.
    pub crf: u32,
    /// e.g. `2400k`, `5M`; selects `-b:v` instead of `-crf`.
    pub bitrate: Option<String>,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            crf: 18,
            bitrate: None,
            preset: "medium".into(),
            audio_bitrate: "192k".into(),
        }
    }
}

/// Encodes a numbered image sequence with the `ffmpeg` binary.
///
/// Frames are staged in a private temp directory which is removed when the
/// encoder is dropped.
pub struct FfmpegEncoder {
    work_dir: PathBuf,
    options: EncoderOptions,
}

impl FfmpegEncoder {
    pub fn new(options: EncoderOptions) -> Result<Self> {
        let work_dir = std::env::temp_dir().join(format!(
            "beatframe-{}-{}",
            std::process::id(),
            WORK_DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&work_dir)?;
        log::debug!("Staging frames in {}", work_dir.display());
        Ok(Self { work_dir, options })
    }

    pub fn is_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn args(&self, pattern: &Path, audio: &Path, output: &Path, frame_rate: u32) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".into(), "error".into(),
            "-framerate".into(), frame_rate.to_string(),
            "-i".into(), pattern.to_string_lossy().into_owned(),
            "-i".into(), audio.to_string_lossy().into_owned(),
            "-c:v".into(), self.options.codec.clone(),
            "-pix_fmt".into(), self.options.pix_fmt.clone(),
        ];

        if let Some(ref br) = self.options.bitrate {
            args.extend(["-b:v".to_string(), br.clone()]);
        } else {
            args.extend(["-crf".to_string(), self.options.crf.to_string()]);
            args.extend(["-preset".to_string(), self.options.preset.clone()]);
        }

        args.extend([
            "-c:a".into(), "aac".into(),
            "-b:a".into(), self.options.audio_bitrate.clone(),
            "-shortest".into(),
            output.to_string_lossy().into_owned(),
        ]);
        args
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.work_dir.join(name), bytes)?;
        Ok(())
    }

    fn encode(&mut self, frames: &[String], audio: &Path, frame_rate: u32) -> Result<Vec<u8>> {
        let extension = frames
            .first()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ExportError::Encoder("no frames to encode".into()))?;

        let pattern = self
            .work_dir
            .join(format!("frame_%0{FRAME_INDEX_DIGITS}d.{extension}"));
        let output = self.work_dir.join(OUTPUT_NAME);
        let args = self.args(&pattern, audio, &output, frame_rate);

        log::info!(
            "FFmpeg encoding {} frames @ {}fps, codec={}",
            frames.len(),
            frame_rate,
            self.options.codec
        );

        let result = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ExportError::Encoder(format!("failed to spawn ffmpeg ({e}). Is ffmpeg installed?")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ExportError::Encoder(format!(
                "ffmpeg exited with {}:\n{}",
                result.status,
                stderr.trim()
            )));
        }

        let video = std::fs::read(&output)?;
        if let Err(e) = std::fs::remove_file(&output) {
            log::warn!("Could not remove {}: {}", output.display(), e);
        }
        log::info!("FFmpeg encoding complete ({} bytes)", video.len());
        Ok(video)
    }

    fn delete_frame(&mut self, name: &str) -> Result<()> {
        std::fs::remove_file(self.work_dir.join(name))?;
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.work_dir) {
            log::warn!("Could not remove {}: {}", self.work_dir.display(), e);
        }
    }
}
