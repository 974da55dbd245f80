use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::audio::AudioData;
use crate::error::{ExportError, Result};
use crate::settings::{ExportSettings, VisualSettings};
use crate::templates::Platform;

use super::{ExportSequencer, Progress};

/// Archive entry name for one platform's video.
pub fn video_entry_name(platform: Platform) -> String {
    format!("visualizer_{platform}.mp4")
}

/// Runs one export per platform and packs the videos into a zip archive.
///
/// The audio is analysed once and the timeline shared by every run.
pub struct BatchExporter<'a> {
    sequencer: ExportSequencer<'a>,
}

impl<'a> BatchExporter<'a> {
    pub fn new(sequencer: ExportSequencer<'a>) -> Self {
        Self { sequencer }
    }

    pub fn sequencer(&self) -> &ExportSequencer<'a> {
        &self.sequencer
    }

    pub fn export(
        &mut self,
        audio: &AudioData,
        audio_path: &Path,
        visual: &VisualSettings,
        base: &ExportSettings,
        platforms: &[Platform],
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<Vec<u8>> {
        if platforms.is_empty() {
            return Err(ExportError::input("no platforms selected"));
        }
        base.validate()?;

        let mut progress = Progress::new(progress);
        progress.report(0.0, "Analyzing audio...");
        let timeline = self.sequencer.analyze(audio, &mut |_, _| {})?;

        let count = platforms.len() as f32;
        let mut videos = Vec::with_capacity(platforms.len());
        for (index, &platform) in platforms.iter().enumerate() {
            self.sequencer.cancel_token().check()?;
            log::info!("Batch {}/{}: {}", index + 1, platforms.len(), platform.display_name());

            let settings = ExportSettings {
                platform,
                ..base.clone()
            };
            let mut inner = |percent: f32, status: &str| {
                let overall = (index as f32 + percent / 100.0) / count * 100.0;
                progress.report(overall, &format!("[{platform}] {status}"));
            };
            let video =
                self.sequencer
                    .export_with_timeline(&timeline, audio_path, visual, &settings, &mut inner)?;
            videos.push((video_entry_name(platform), video));
        }

        progress.report(100.0, "Packaging archive...");
        let archive = pack(&videos)?;
        log::info!("Batch archive: {} videos, {} bytes", videos.len(), archive.len());
        progress.report(100.0, "Done!");
        Ok(archive)
    }
}

fn pack(videos: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // mp4 is already compressed
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in videos {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sequencer::tests::{
        test_audio, two_second_export, RecordingEncoder, SmallSurfaces,
    };
    use crate::export::CancelToken;
    use crate::render::StyleRegistry;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn batch_collects_one_video_per_platform() {
        let audio = test_audio(2.2);
        let mut encoder = RecordingEncoder::default();
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();
        let mut reports: Vec<f32> = Vec::new();

        let archive = {
            let sequencer = ExportSequencer::new(&mut encoder, &surfaces, &styles);
            BatchExporter::new(sequencer)
                .export(
                    &audio,
                    Path::new("track.wav"),
                    &VisualSettings::default(),
                    &two_second_export(Platform::Youtube),
                    &[Platform::Youtube, Platform::Tiktok],
                    &mut |p, _| reports.push(p),
                )
                .unwrap()
        };

        assert_eq!(reports.first(), Some(&0.0));
        assert_eq!(reports.last(), Some(&100.0));
        assert!(reports.windows(2).all(|w| w[0] <= w[1]), "{reports:?}");
        assert!(reports.iter().any(|&p| p > 40.0 && p < 60.0));

        assert_eq!(encoder.encode_calls, 2);
        assert_eq!(encoder.written.len(), 120);
        assert_eq!(surfaces.created.get(), 2);

        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 2);
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["visualizer_TIKTOK.mp4", "visualizer_YOUTUBE.mp4"]);

        let mut body = String::new();
        zip.by_name("visualizer_TIKTOK.mp4")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "video:60:30");
    }

    #[test]
    fn cancelled_batch_stops_between_platforms() {
        let audio = test_audio(2.0);
        let token = CancelToken::new();
        // trips during the second platform's first frame
        let mut encoder = RecordingEncoder {
            cancel_at: Some((60, token.clone())),
            ..Default::default()
        };
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();

        let err = {
            let sequencer =
                ExportSequencer::new(&mut encoder, &surfaces, &styles).with_cancel(token);
            BatchExporter::new(sequencer)
                .export(
                    &audio,
                    Path::new("track.wav"),
                    &VisualSettings::default(),
                    &two_second_export(Platform::Youtube),
                    &[Platform::Youtube, Platform::Square, Platform::Reels],
                    &mut |_, _| {},
                )
                .unwrap_err()
        };
        assert!(err.is_cancelled());
        assert_eq!(encoder.encode_calls, 1);
        assert_eq!(encoder.written.len(), 61);
        assert_eq!(encoder.deleted.len(), 61);
    }

    #[test]
    fn empty_platform_list_is_rejected() {
        let audio = test_audio(1.0);
        let mut encoder = RecordingEncoder::default();
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();
        let sequencer = ExportSequencer::new(&mut encoder, &surfaces, &styles);
        let err = BatchExporter::new(sequencer)
            .export(
                &audio,
                Path::new("track.wav"),
                &VisualSettings::default(),
                &ExportSettings::default(),
                &[],
                &mut |_, _| {},
            )
            .unwrap_err();
        assert!(matches!(err, ExportError::Input(_)));
    }
}
