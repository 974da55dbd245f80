use std::path::Path;

use crate::audio::{AudioData, PrecomputedSpectrum, Timeline};
use crate::encode::{frame_name, VideoEncoder};
use crate::error::{ExportError, Result};
use crate::render::{render_frame, FrameInput, StyleRegistry, SurfaceFactory, VisualRunState};
use crate::settings::{ExportSettings, VisualSettings};

use super::{CancelToken, ExportJob, ExportPhase, Progress};

/// Drives an offline render: analyse once, then draw, serialize and hand
/// over every frame in order, then encode.
pub struct ExportSequencer<'a> {
    encoder: &'a mut dyn VideoEncoder,
    surfaces: &'a dyn SurfaceFactory,
    styles: &'a StyleRegistry,
    cancel: CancelToken,
    phase: ExportPhase,
}

impl<'a> ExportSequencer<'a> {
    pub fn new(
        encoder: &'a mut dyn VideoEncoder,
        surfaces: &'a dyn SurfaceFactory,
        styles: &'a StyleRegistry,
    ) -> Self {
        Self {
            encoder,
            surfaces,
            styles,
            cancel: CancelToken::new(),
            phase: ExportPhase::Idle,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    /// Full export of `audio` (muxed from `audio_path`) to video bytes.
    pub fn export(
        &mut self,
        audio: &AudioData,
        audio_path: &Path,
        visual: &VisualSettings,
        settings: &ExportSettings,
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<Vec<u8>> {
        progress(0.0, "Initializing export...");
        settings.validate()?;
        let timeline = self.analyze(audio, progress)?;
        self.export_with_timeline(&timeline, audio_path, visual, settings, progress)
    }

    /// Offline analysis pass. Cancellation is honoured before and after it.
    pub fn analyze(
        &mut self,
        audio: &AudioData,
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<Timeline> {
        self.phase = ExportPhase::Analyzing;
        let result = self.cancel.check().and_then(|_| {
            progress(2.0, "Analyzing audio...");
            let timeline = Timeline::build(audio)?;
            self.cancel.check()?;
            Ok(timeline)
        });
        if let Err(ref e) = result {
            self.settle(e);
        }
        result
    }

    /// Render and encode against an already built timeline.
    pub fn export_with_timeline(
        &mut self,
        timeline: &Timeline,
        audio_path: &Path,
        visual: &VisualSettings,
        settings: &ExportSettings,
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<Vec<u8>> {
        let mut progress = Progress::new(progress);
        progress.report(10.0, "Analysis complete");

        let job = match ExportJob::plan(settings, timeline.duration()) {
            Ok(job) => job,
            Err(e) => {
                self.settle(&e);
                return Err(e);
            }
        };
        log::info!(
            "Export {}: {}x{} @ {}fps, {} frames ({:.2}s)",
            job.platform,
            job.layout.width,
            job.layout.height,
            job.frame_rate,
            job.total_frames,
            job.duration_seconds
        );

        let mut written = Vec::with_capacity(job.total_frames);
        let result = self.run(&job, timeline, audio_path, visual, &mut written, &mut progress);
        self.cleanup(&written);

        match result {
            Ok(video) => {
                self.phase = ExportPhase::Done;
                progress.report(100.0, "Done!");
                Ok(video)
            }
            Err(e) => {
                self.settle(&e);
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        job: &ExportJob,
        timeline: &Timeline,
        audio_path: &Path,
        visual: &VisualSettings,
        written: &mut Vec<String>,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<u8>> {
        self.phase = ExportPhase::Rendering;
        let visual = visual.normalized();
        let mut surface = self.surfaces.create(job.layout.width, job.layout.height)?;
        let mut source = PrecomputedSpectrum::new(timeline.bin_count(), timeline.sample_rate());
        let mut state = VisualRunState::new();

        let extension = job.frame_format.extension();
        for i in 0..job.total_frames {
            self.cancel.check()?;

            let input = FrameInput::for_frame(i, job.frame_rate);
            match timeline.nearest(input.time_ms / 1000.0) {
                Some(entry) => source.set_entry(entry),
                None => source.clear(),
            }
            render_frame(
                &mut state,
                &mut source,
                surface.as_mut(),
                &visual,
                &job.layout,
                self.styles,
                input,
            );

            let bytes = surface.encode(job.frame_format)?;
            let name = frame_name(i, extension);
            written.push(name.clone());
            self.encoder.write_frame(&name, &bytes)?;

            let done = i + 1;
            progress.throttled(
                10.0 + 80.0 * done as f32 / job.total_frames as f32,
                &format!("Rendering frame {}/{}...", done, job.total_frames),
            );
        }
        self.cancel.check()?;

        self.phase = ExportPhase::Encoding;
        progress.report(90.0, "Encoding video...");
        self.encoder.encode(written, audio_path, job.frame_rate)
    }

    /// Best-effort removal of every frame handed to the encoder.
    fn cleanup(&mut self, written: &[String]) {
        let mut failed = 0;
        for name in written {
            if let Err(e) = self.encoder.delete_frame(name) {
                failed += 1;
                log::debug!("Could not delete {}: {}", name, e);
            }
        }
        if failed > 0 {
            log::warn!("{} of {} intermediate frames could not be removed", failed, written.len());
        }
    }

    fn settle(&mut self, error: &ExportError) {
        if error.is_cancelled() {
            log::info!("Export cancelled");
            self.phase = ExportPhase::Cancelled;
        } else {
            self.phase = ExportPhase::Idle;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::render::{RasterSurface, Surface};
    use crate::settings::{FrameFormat, ResolutionTier};
    use crate::templates::Platform;
    use std::cell::Cell;

    /// Encoder double that remembers every call.
    #[derive(Default)]
    pub(crate) struct RecordingEncoder {
        pub written: Vec<String>,
        pub deleted: Vec<String>,
        pub encode_calls: usize,
        pub fail_encode: bool,
        pub cancel_at: Option<(usize, CancelToken)>,
    }

    impl VideoEncoder for RecordingEncoder {
        fn write_frame(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
            assert!(!bytes.is_empty());
            self.written.push(name.to_string());
            if let Some((at, ref token)) = self.cancel_at {
                if self.written.len() == at + 1 {
                    token.cancel();
                }
            }
            Ok(())
        }

        fn encode(&mut self, frames: &[String], _audio: &Path, frame_rate: u32) -> Result<Vec<u8>> {
            self.encode_calls += 1;
            if self.fail_encode {
                return Err(ExportError::Encoder("boom".into()));
            }
            Ok(format!("video:{}:{}", frames.len(), frame_rate).into_bytes())
        }

        fn delete_frame(&mut self, name: &str) -> Result<()> {
            self.deleted.push(name.to_string());
            Ok(())
        }
    }

    /// Surface factory that counts allocations and keeps frames tiny.
    #[derive(Default)]
    pub(crate) struct SmallSurfaces {
        pub created: Cell<usize>,
    }

    impl SurfaceFactory for SmallSurfaces {
        fn create(&self, width: u32, height: u32) -> Result<Box<dyn Surface>> {
            self.created.set(self.created.get() + 1);
            Ok(Box::new(RasterSurface::new((width / 40).max(2), (height / 40).max(2))?))
        }
    }

    pub(crate) fn test_audio(seconds: f32) -> AudioData {
        let sample_rate = 22_050;
        let len = (seconds * sample_rate as f32) as usize;
        let samples: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let env = if (t * 2.0).fract() < 0.1 { 0.8 } else { 0.05 };
                env * (2.0 * std::f32::consts::PI * 70.0 * t).sin()
            })
            .collect();
        AudioData::new(vec![samples.clone(), samples], sample_rate).unwrap()
    }

    pub(crate) fn two_second_export(platform: Platform) -> ExportSettings {
        ExportSettings {
            platform,
            resolution: ResolutionTier::Hd,
            frame_rate: 30,
            duration: 2.0,
            frame_format: FrameFormat::Png,
        }
    }

    #[test]
    fn renders_contiguous_frames_then_encodes_once() {
        let audio = test_audio(2.5);
        let mut encoder = RecordingEncoder::default();
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();
        let mut reports = Vec::new();

        let mut sequencer = ExportSequencer::new(&mut encoder, &surfaces, &styles);
        let video = sequencer
            .export(
                &audio,
                Path::new("track.wav"),
                &VisualSettings::default(),
                &two_second_export(Platform::Youtube),
                &mut |p, s| reports.push((p, s.to_string())),
            )
            .unwrap();
        assert_eq!(sequencer.phase(), ExportPhase::Done);

        assert_eq!(video, b"video:60:30");
        let expected: Vec<String> = (0..60).map(|i| frame_name(i, "png")).collect();
        assert_eq!(encoder.written, expected);
        assert_eq!(encoder.deleted, expected);
        assert_eq!(encoder.encode_calls, 1);
        assert_eq!(surfaces.created.get(), 1);

        assert_eq!(reports.first().map(|r| r.0), Some(0.0));
        assert_eq!(reports.last().map(|r| (r.0, r.1.as_str())), Some((100.0, "Done!")));
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
        // throttled: far fewer reports than frames
        assert!(reports.len() < 100);
    }

    #[test]
    fn frames_resolve_to_nearby_timeline_entries() {
        let audio = test_audio(2.0);
        let timeline = Timeline::build(&audio).unwrap();
        for i in 0..60 {
            let t = FrameInput::for_frame(i, 30).time_ms / 1000.0;
            let entry = timeline.nearest(t).unwrap();
            assert!((entry.time - t).abs() <= timeline.block_duration());
        }
    }

    #[test]
    fn cancel_stops_at_next_frame_and_cleans_up() {
        let audio = test_audio(2.0);
        let token = CancelToken::new();
        let mut encoder = RecordingEncoder {
            cancel_at: Some((10, token.clone())),
            ..Default::default()
        };
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();

        let mut sequencer =
            ExportSequencer::new(&mut encoder, &surfaces, &styles).with_cancel(token);
        let err = sequencer
            .export(
                &audio,
                Path::new("track.wav"),
                &VisualSettings::default(),
                &two_second_export(Platform::Youtube),
                &mut |_, _| {},
            )
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(sequencer.phase(), ExportPhase::Cancelled);

        let expected: Vec<String> = (0..=10).map(|i| frame_name(i, "png")).collect();
        assert_eq!(encoder.written, expected);
        assert_eq!(encoder.deleted, expected);
        assert_eq!(encoder.encode_calls, 0);
    }

    #[test]
    fn encoder_failure_still_cleans_up() {
        let audio = test_audio(1.0);
        let mut encoder = RecordingEncoder {
            fail_encode: true,
            ..Default::default()
        };
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();
        let settings = ExportSettings {
            duration: 0.0,
            ..two_second_export(Platform::Square)
        };

        let mut sequencer = ExportSequencer::new(&mut encoder, &surfaces, &styles);
        let err = sequencer
            .export(
                &audio,
                Path::new("track.wav"),
                &VisualSettings::default(),
                &settings,
                &mut |_, _| {},
            )
            .unwrap_err();
        assert!(matches!(err, ExportError::Encoder(_)));
        assert_eq!(sequencer.phase(), ExportPhase::Idle);
        assert_eq!(encoder.written.len(), 30);
        assert_eq!(encoder.deleted, encoder.written);
    }

    #[test]
    fn invalid_input_fails_before_any_frame() {
        let audio = test_audio(1.0);
        let mut encoder = RecordingEncoder::default();
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();
        let settings = ExportSettings {
            frame_rate: 25,
            ..two_second_export(Platform::Youtube)
        };

        let mut sequencer = ExportSequencer::new(&mut encoder, &surfaces, &styles);
        let err = sequencer
            .export(
                &audio,
                Path::new("track.wav"),
                &VisualSettings::default(),
                &settings,
                &mut |_, _| {},
            )
            .unwrap_err();
        assert!(matches!(err, ExportError::Input(_)));
        assert!(encoder.written.is_empty());
        assert_eq!(surfaces.created.get(), 0);
    }

    #[test]
    fn repeated_runs_produce_identical_frames() {
        struct Capture(Vec<Vec<u8>>);

        impl VideoEncoder for Capture {
            fn write_frame(&mut self, _: &str, bytes: &[u8]) -> Result<()> {
                self.0.push(bytes.to_vec());
                Ok(())
            }

            fn encode(&mut self, _: &[String], _: &Path, _: u32) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }

            fn delete_frame(&mut self, _: &str) -> Result<()> {
                Ok(())
            }
        }

        let audio = test_audio(1.0);
        let surfaces = SmallSurfaces::default();
        let styles = StyleRegistry::builtin();
        let settings = ExportSettings {
            duration: 0.5,
            ..two_second_export(Platform::Reels)
        };
        let visual = VisualSettings {
            stereo_mode: true,
            multiple_waveforms: 2,
            particles: true,
            ..Default::default()
        };

        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut capture = Capture(Vec::new());
            ExportSequencer::new(&mut capture, &surfaces, &styles)
                .export(&audio, Path::new("a.wav"), &visual, &settings, &mut |_, _| {})
                .unwrap();
            runs.push(capture.0);
        }
        assert_eq!(runs[0].len(), 15);
        assert_eq!(runs[0], runs[1]);
    }
}
