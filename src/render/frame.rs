//! The per-frame visual update shared by live preview and export.
//!
//! [`advance`] turns the source's current snapshot into bands, onsets, glow,
//! particles and smoothed layers; [`draw_frame`] paints them. Both paths call exactly
//! these two functions, so a given sequence of snapshots produces the same
//! pictures whichever scheduler drives it.

use crate::audio::bands::{reduce_to_bands, reduce_to_bars};
use crate::audio::{BeatDetector, BeatReading, ChannelView, FrequencyBands, SmoothingEngine, SpectralSource};
use crate::settings::VisualSettings;
use crate::templates::FrameLayout;

use super::particles::ParticleField;
use super::styles::{StyleFrame, StyleRegistry, StyleRenderer};
use super::surface::Surface;

/// Display refresh rate the per-tick constants are tuned for.
pub const REFERENCE_RATE: f64 = 60.0;

/// Clock reading for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    /// Position in the track, milliseconds.
    pub time_ms: f64,
    /// Frames per second of whatever is driving the updates.
    pub frame_rate: f64,
}

impl FrameInput {
    /// Clock for frame `index` of an export at `frame_rate`.
    pub fn for_frame(index: usize, frame_rate: u32) -> Self {
        Self {
            time_ms: index as f64 * 1000.0 / frame_rate as f64,
            frame_rate: frame_rate as f64,
        }
    }

    fn tick_ratio(&self) -> f32 {
        (REFERENCE_RATE / self.frame_rate.max(1.0)) as f32
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameAnalysis {
    pub bands: FrequencyBands,
    pub beat: BeatReading,
    pub beat_glow: f32,
}

/// Mutable state carried from one frame to the next within a run.
#[derive(Clone, Debug, Default)]
pub struct VisualRunState {
    pub beats: BeatDetector,
    pub smoothing: SmoothingEngine,
    pub beat_glow: f32,
    /// Circular style angle, radians.
    pub rotation: f32,
    /// Elapsed 60 Hz ticks.
    pub ticks: f32,
    pub particles: ParticleField,
    last: Option<FrameAnalysis>,
}

impl VisualRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything from the previous run.
    pub fn reset(&mut self) {
        self.beats.reset_history();
        self.smoothing.reset();
        self.beat_glow = 0.0;
        self.rotation = 0.0;
        self.ticks = 0.0;
        self.particles.reset();
        self.last = None;
    }

    pub fn last_analysis(&self) -> Option<&FrameAnalysis> {
        self.last.as_ref()
    }
}

/// Linear glow decay for one frame; a zero decay time drops the glow at once.
fn decay_glow(glow: f32, decay_time: f32, frame_rate: f64) -> f32 {
    if decay_time <= 0.0 {
        return 0.0;
    }
    (glow - 1.0 / (decay_time * frame_rate as f32)).max(0.0)
}

/// Pull the current snapshot and step every piece of run state by one frame.
pub fn advance(
    state: &mut VisualRunState,
    source: &mut dyn SpectralSource,
    settings: &VisualSettings,
    layout: &FrameLayout,
    input: FrameInput,
) -> FrameAnalysis {
    let main = source.current_snapshot(ChannelView::Main);
    let bands = reduce_to_bands(&main);
    let beat = state.beats.read(&bands, settings.sensitivity, input.time_ms);

    state.beat_glow = if beat.is_beat() {
        1.0
    } else {
        decay_glow(state.beat_glow, settings.decay_time, input.frame_rate)
    };

    let ratio = input.tick_ratio();
    state.ticks += ratio;
    if settings.circular_rotation {
        let speed = settings.signed_rotation_speed();
        state.rotation += (speed * 0.01 + state.beat_glow * speed * 0.05) * ratio;
    }

    state.particles.step(
        layout.width as f32 / layout.scale,
        layout.height as f32 / layout.scale,
        settings,
        state.beat_glow + beat.snare * 0.5,
        ratio,
    );

    if settings.stereo_mode {
        let left = reduce_to_bars(&source.current_snapshot(ChannelView::Left), settings.bar_count);
        let right = reduce_to_bars(&source.current_snapshot(ChannelView::Right), settings.bar_count);
        state.smoothing.update(&left, Some(&right), settings.multiple_waveforms, settings.decay_time);
    } else {
        let bars = reduce_to_bars(&main, settings.bar_count);
        state.smoothing.update(&bars, None, settings.multiple_waveforms, settings.decay_time);
    }

    let analysis = FrameAnalysis {
        bands,
        beat,
        beat_glow: state.beat_glow,
    };
    state.last = Some(analysis);
    analysis
}

/// Paint the background, every active waveform layer oldest first, then
/// the particles.
pub fn draw_frame(
    surface: &mut dyn Surface,
    state: &VisualRunState,
    analysis: &FrameAnalysis,
    settings: &VisualSettings,
    layout: &FrameLayout,
    styles: &StyleRegistry,
) {
    surface.clear(settings.background_color);

    match styles.get(settings.waveform_style) {
        Some(renderer) => draw_layers(surface, renderer, state, analysis, settings, layout),
        None => log::debug!("No renderer registered for {:?}", settings.waveform_style),
    }

    state.particles.draw(surface, layout.scale);
}

fn draw_layers(
    surface: &mut dyn Surface,
    renderer: &dyn StyleRenderer,
    state: &VisualRunState,
    analysis: &FrameAnalysis,
    settings: &VisualSettings,
    layout: &FrameLayout,
) {
    let layers = settings.multiple_waveforms.max(1);
    let glow = if settings.glow {
        (20.0 + analysis.beat_glow * 30.0 + analysis.beat.snare * 10.0) * layout.scale
    } else {
        0.0
    };

    for i in (0..layers).rev() {
        let alpha = if i == 0 { 1.0 } else { 0.5 / i as f32 };
        let (color, right_color) = if i == 0 {
            (settings.primary_color, settings.secondary_color)
        } else {
            (settings.secondary_color, settings.primary_color)
        };

        let mut channels = vec![(state.smoothing.layer(i), color, false)];
        if settings.stereo_mode {
            channels.push((state.smoothing.right_layer(i, layers), right_color, true));
        }

        for (bars, color, right) in channels {
            let Some(bars) = bars else { continue };
            let frame = StyleFrame {
                area: layout.waveform_rect(settings, right),
                bars,
                color,
                alpha,
                glow,
                beat_glow: analysis.beat_glow,
                mirror: settings.mirror,
                scale: layout.scale,
                rotation: state.rotation,
                ticks: state.ticks,
            };
            renderer.draw(surface, &frame);
        }
    }
}

/// [`advance`] followed by [`draw_frame`].
#[allow(clippy::too_many_arguments)]
pub fn render_frame(
    state: &mut VisualRunState,
    source: &mut dyn SpectralSource,
    surface: &mut dyn Surface,
    settings: &VisualSettings,
    layout: &FrameLayout,
    styles: &StyleRegistry,
    input: FrameInput,
) -> FrameAnalysis {
    let analysis = advance(state, source, settings, layout, input);
    draw_frame(surface, state, &analysis, settings, layout, styles);
    analysis
}
