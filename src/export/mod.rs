pub mod batch;
pub mod sequencer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ExportError, Result};
use crate::settings::{ExportSettings, FrameFormat};
use crate::templates::{FrameLayout, Platform};

pub use batch::BatchExporter;
pub use sequencer::ExportSequencer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Analyzing,
    Rendering,
    Encoding,
    Done,
    Cancelled,
}

/// Shared cancel flag, polled at frame boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`CancelToken::cancel`] has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Resolved parameters of one export run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportJob {
    pub platform: Platform,
    pub layout: FrameLayout,
    pub frame_rate: u32,
    pub duration_seconds: f64,
    pub total_frames: usize,
    pub frame_format: FrameFormat,
}

impl ExportJob {
    pub fn plan(settings: &ExportSettings, track_seconds: f64) -> Result<Self> {
        settings.validate()?;
        let total_frames = settings.total_frames(track_seconds);
        if total_frames == 0 {
            return Err(ExportError::input(format!(
                "nothing to render: {:.3}s of audio at {}fps",
                track_seconds, settings.frame_rate
            )));
        }
        Ok(Self {
            platform: settings.platform,
            layout: FrameLayout::new(settings.platform, settings.resolution),
            frame_rate: settings.frame_rate,
            duration_seconds: settings.effective_duration(track_seconds),
            total_frames,
            frame_format: settings.frame_format,
        })
    }

    pub fn resolution_scale(&self) -> f32 {
        self.layout.scale
    }
}

/// Forwards progress to a listener, never moving backwards.
///
/// [`Progress::throttled`] only passes updates that reach a new whole percent.
pub struct Progress<'a> {
    sink: &'a mut dyn FnMut(f32, &str),
    last: f32,
    last_whole: i32,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a mut dyn FnMut(f32, &str)) -> Self {
        Self {
            sink,
            last: 0.0,
            last_whole: -1,
        }
    }

    pub fn report(&mut self, percent: f32, status: &str) {
        let percent = percent.clamp(0.0, 100.0).max(self.last);
        self.last = percent;
        self.last_whole = percent.floor() as i32;
        (self.sink)(percent, status);
    }

    pub fn throttled(&mut self, percent: f32, status: &str) {
        if percent.floor() as i32 > self.last_whole {
            self.report(percent, status);
        }
    }
}
