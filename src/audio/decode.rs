use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ExportError, Result};

/// Fully decoded track, one sample vector per channel.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let audio = Self {
            channels,
            sample_rate,
        };
        audio.validate()?;
        Ok(audio)
    }

    /// Rejects buffers the analysis path cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ExportError::input("audio has a zero sample rate"));
        }
        let Some(first) = self.channels.first() else {
            return Err(ExportError::input("audio has no channels"));
        };
        if first.is_empty() {
            return Err(ExportError::input("audio contains no samples"));
        }
        if self.channels.iter().any(|c| c.len() != first.len()) {
            return Err(ExportError::input("audio channels differ in length"));
        }
        Ok(())
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn left(&self) -> &[f32] {
        &self.channels[0]
    }

    /// Second channel, or the first one again for mono material.
    pub fn right(&self) -> &[f32] {
        self.channels.get(1).unwrap_or(&self.channels[0])
    }

    /// Mono mix of a single sample frame.
    pub fn mix_at(&self, index: usize) -> f32 {
        let sum: f32 = self.channels.iter().map(|c| c[index]).sum();
        sum / self.channels.len() as f32
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path).map_err(|e| {
        ExportError::input(format!("failed to open audio file {}: {e}", path.display()))
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ExportError::input(format!("failed to probe audio format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| ExportError::input("no audio tracks found"))?;

    let track_id = track.id;
    let channel_count = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ExportError::input("unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ExportError::input(format!("failed to create audio decoder: {e}")))?;

    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(ExportError::input(format!("failed to read packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(ExportError::input(format!("failed to decode packet: {e}"))),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let packet_channels = spec.channels.count();
        if packet_channels != channels.len() {
            return Err(ExportError::input(format!(
                "packet has {} channels, stream declared {}",
                packet_channels,
                channels.len()
            )));
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        deinterleave(sample_buf.samples(), &mut channels);
    }

    let audio = AudioData::new(channels, sample_rate)?;

    log::info!(
        "Decoded audio: {} frames x {} channels, {}Hz, {:.1}s",
        audio.frames(),
        audio.channel_count(),
        sample_rate,
        audio.duration()
    );

    Ok(audio)
}

/// Append interleaved frames to per-channel buffers; the frame width is
/// `channels.len()`.
fn deinterleave(samples: &[f32], channels: &mut [Vec<f32>]) {
    let width = channels.len();
    if width == 0 {
        return;
    }
    for frame in samples.chunks_exact(width) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_ragged_buffers() {
        assert!(AudioData::new(vec![], 44_100).is_err());
        assert!(AudioData::new(vec![vec![]], 44_100).is_err());
        assert!(AudioData::new(vec![vec![0.0; 4]], 0).is_err());
        let err = AudioData::new(vec![vec![0.0; 4], vec![0.0; 3]], 44_100).unwrap_err();
        assert!(matches!(err, ExportError::Input(_)));
    }

    #[test]
    fn mono_right_falls_back_to_left() {
        let audio = AudioData::new(vec![vec![0.5, -0.5]], 8_000).unwrap();
        assert_eq!(audio.right(), audio.left());
        assert_eq!(audio.mix_at(0), 0.5);
        assert!((audio.duration() - 2.0 / 8_000.0).abs() < 1e-12);
    }

    #[test]
    fn deinterleave_splits_frames_by_channel() {
        let mut channels = vec![Vec::new(); 2];
        deinterleave(&[0.1, 0.2, 0.3, 0.4, 0.5], &mut channels);
        assert_eq!(channels[0], vec![0.1, 0.3]);
        assert_eq!(channels[1], vec![0.2, 0.4]);

        let mut mono = vec![Vec::new()];
        deinterleave(&[0.1, 0.2], &mut mono);
        assert_eq!(mono[0], vec![0.1, 0.2]);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = decode_audio(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, ExportError::Input(_)));
    }
}
