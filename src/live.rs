use crate::audio::SpectralSource;
use crate::render::{draw_frame, render_frame, FrameAnalysis, FrameInput, StyleRegistry, Surface, VisualRunState};
use crate::settings::VisualSettings;
use crate::templates::FrameLayout;

/// Refresh rate live ticks are assumed to arrive at.
pub const DISPLAY_REFRESH_HZ: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Drives the frame update from the display refresh while audio plays.
///
/// Ticks do nothing unless playing. A settings change while paused or
/// stopped redraws once from the current state so edits show immediately.
pub struct LiveScheduler<S> {
    source: S,
    state: VisualRunState,
    settings: VisualSettings,
    layout: FrameLayout,
    playback: PlaybackState,
    position_ms: f64,
    refresh_hz: f64,
}

impl<S: SpectralSource> LiveScheduler<S> {
    pub fn new(source: S, settings: VisualSettings, layout: FrameLayout) -> Self {
        Self {
            source,
            state: VisualRunState::new(),
            settings: settings.normalized(),
            layout,
            playback: PlaybackState::Stopped,
            position_ms: 0.0,
            refresh_hz: DISPLAY_REFRESH_HZ,
        }
    }

    pub fn with_refresh_rate(mut self, hz: f64) -> Self {
        self.refresh_hz = hz.max(1.0);
        self
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn state(&self) -> &VisualRunState {
        &self.state
    }

    pub fn settings(&self) -> &VisualSettings {
        &self.settings
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn position_ms(&self) -> f64 {
        self.position_ms
    }

    pub fn play(&mut self) {
        if self.playback == PlaybackState::Stopped {
            self.state.reset();
        }
        self.playback = PlaybackState::Playing;
    }

    pub fn pause(&mut self) {
        if self.playback == PlaybackState::Playing {
            self.playback = PlaybackState::Paused;
        }
    }

    /// Stop and rewind; the next play starts a fresh session.
    pub fn stop(&mut self) {
        self.playback = PlaybackState::Stopped;
        self.position_ms = 0.0;
        self.state.reset();
        self.source.reset();
    }

    /// Jump to `position_ms`. Histories from before the jump are dropped.
    pub fn seek(&mut self, position_ms: f64) {
        self.position_ms = position_ms.max(0.0);
        self.state.reset();
        self.source.reset();
    }

    /// One display refresh. Returns the frame's analysis, or `None` when
    /// playback is not running and nothing was drawn.
    pub fn tick(
        &mut self,
        surface: &mut dyn Surface,
        styles: &StyleRegistry,
        elapsed_ms: f64,
    ) -> Option<FrameAnalysis> {
        if self.playback != PlaybackState::Playing {
            return None;
        }
        self.position_ms += elapsed_ms.max(0.0);
        let input = FrameInput {
            time_ms: self.position_ms,
            frame_rate: self.refresh_hz,
        };
        Some(render_frame(
            &mut self.state,
            &mut self.source,
            surface,
            &self.settings,
            &self.layout,
            styles,
            input,
        ))
    }

    /// Apply new settings; redraws synchronously when not playing. Returns
    /// whether a redraw happened.
    pub fn update_settings(
        &mut self,
        settings: VisualSettings,
        surface: &mut dyn Surface,
        styles: &StyleRegistry,
    ) -> bool {
        self.settings = settings.normalized();
        if self.playback == PlaybackState::Playing {
            return false;
        }
        let analysis = self.state.last_analysis().copied().unwrap_or_default();
        draw_frame(surface, &self.state, &analysis, &self.settings, &self.layout, styles);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ChannelView, MagnitudeSnapshot, PrecomputedSpectrum};
    use crate::render::RasterSurface;
    use crate::settings::{Color, ResolutionTier};
    use crate::templates::Platform;

    /// Source that counts how often it is read.
    struct Counting {
        inner: PrecomputedSpectrum,
        reads: usize,
        resets: usize,
    }

    impl SpectralSource for Counting {
        fn current_snapshot(&mut self, view: ChannelView) -> MagnitudeSnapshot {
            self.reads += 1;
            self.inner.current_snapshot(view)
        }

        fn bin_count(&self) -> usize {
            self.inner.bin_count()
        }

        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn scheduler() -> (LiveScheduler<Counting>, RasterSurface, StyleRegistry) {
        let mut bins = vec![0u8; 1024];
        bins[..10].iter_mut().for_each(|b| *b = 250);
        let snapshot = MagnitudeSnapshot::new(bins, 44_100);
        let mut inner = PrecomputedSpectrum::new(1024, 44_100);
        inner.set_snapshot(snapshot.clone(), snapshot.clone(), snapshot, 0.0);

        let layout = FrameLayout::new(Platform::Square, ResolutionTier::Hd);
        let surface = RasterSurface::new(layout.width / 8, layout.height / 8).unwrap();
        let source = Counting {
            inner,
            reads: 0,
            resets: 0,
        };
        (
            LiveScheduler::new(source, VisualSettings::default(), layout),
            surface,
            StyleRegistry::builtin(),
        )
    }

    #[test]
    fn ticks_only_advance_while_playing() {
        let (mut live, mut surface, styles) = scheduler();
        assert!(live.tick(&mut surface, &styles, 16.7).is_none());
        assert_eq!(live.source_mut().reads, 0);

        live.play();
        for _ in 0..10 {
            assert!(live.tick(&mut surface, &styles, 1000.0 / 60.0).is_some());
        }
        let reads = live.source_mut().reads;
        assert!(reads >= 10);
        assert!((live.position_ms() - 166.666).abs() < 0.01);

        live.pause();
        assert!(live.tick(&mut surface, &styles, 16.7).is_none());
        assert_eq!(live.source_mut().reads, reads);
        assert_eq!(live.playback(), PlaybackState::Paused);
    }

    #[test]
    fn settings_change_while_paused_redraws_once() {
        let (mut live, mut surface, styles) = scheduler();
        live.play();
        live.tick(&mut surface, &styles, 16.7);
        live.pause();
        let reads = live.source_mut().reads;
        let smoothing_before = live.state().smoothing.layers().to_vec();

        let settings = VisualSettings {
            background_color: Color::rgb(1, 2, 3),
            ..Default::default()
        };
        assert!(live.update_settings(settings.clone(), &mut surface, &styles));
        assert_eq!(surface.pixel(0, 0), Some([1, 2, 3, 255]));
        // redraw reuses the held state without pulling new audio
        assert_eq!(live.source_mut().reads, reads);
        assert_eq!(live.state().smoothing.layers(), &smoothing_before[..]);

        live.play();
        assert!(!live.update_settings(settings, &mut surface, &styles));
    }

    #[test]
    fn stop_and_seek_start_a_fresh_session() {
        let (mut live, mut surface, styles) = scheduler();
        live.play();
        for _ in 0..30 {
            live.tick(&mut surface, &styles, 1000.0 / 60.0);
        }
        assert!(!live.state().smoothing.layers().is_empty());
        assert!(live.state().rotation > 0.0);

        live.seek(5_000.0);
        assert_eq!(live.position_ms(), 5_000.0);
        assert_eq!(live.state().beats.last_onset_ms(), 0.0);
        assert_eq!(live.state().rotation, 0.0);
        assert!(live.state().smoothing.layers().is_empty());

        live.stop();
        assert_eq!(live.position_ms(), 0.0);
        assert_eq!(live.playback(), PlaybackState::Stopped);
        assert_eq!(live.source_mut().resets, 2);
    }
}
