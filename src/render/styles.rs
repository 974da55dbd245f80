//! Built-in waveform style renderers.
//!
//! Each renderer draws one layer of bars into an area of the surface. All
//! pixel constants are given at native 4K size and multiplied by
//! [`StyleFrame::scale`].

use std::collections::HashMap;
use std::f32::consts::TAU;

use super::surface::{Paint, Surface};
use crate::settings::{Color, WaveformStyle};
use crate::templates::Area;

/// Everything a style needs to draw one layer.
#[derive(Clone, Copy, Debug)]
pub struct StyleFrame<'a> {
    pub area: Area,
    pub bars: &'a [f32],
    pub color: Color,
    pub alpha: f32,
    /// Glow radius in output pixels, 0 when glow is off.
    pub glow: f32,
    /// Beat pulse in 0..=1.
    pub beat_glow: f32,
    pub mirror: bool,
    /// Output width over native template width.
    pub scale: f32,
    /// Radians, used by the circular style.
    pub rotation: f32,
    /// Elapsed 60 Hz display ticks, used by the animated line.
    pub ticks: f32,
}

impl StyleFrame<'_> {
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    fn paint(&self) -> Paint {
        Paint::solid(self.color)
            .with_alpha(self.alpha)
            .with_glow(self.glow)
    }

    fn amplitude(&self, i: usize) -> f32 {
        (self.bars[i] / 255.0).clamp(0.0, 1.5)
    }
}

pub trait StyleRenderer {
    fn draw(&self, surface: &mut dyn Surface, frame: &StyleFrame<'_>);
}

/// Lookup of the renderer used for each [`WaveformStyle`].
pub struct StyleRegistry {
    renderers: HashMap<WaveformStyle, Box<dyn StyleRenderer>>,
}

impl StyleRegistry {
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(WaveformStyle::Bars, Box::new(BarsStyle));
        registry.register(WaveformStyle::Dots, Box::new(DotsStyle));
        registry.register(WaveformStyle::Waves, Box::new(WavesStyle));
        registry.register(WaveformStyle::Spectrum, Box::new(SpectrumStyle));
        registry.register(WaveformStyle::Circular, Box::new(CircularStyle));
        registry.register(WaveformStyle::AnimatedLine, Box::new(AnimatedLineStyle));
        registry
    }

    /// Install `renderer` for `style`, replacing any previous one.
    pub fn register(&mut self, style: WaveformStyle, renderer: Box<dyn StyleRenderer>) {
        self.renderers.insert(style, renderer);
    }

    pub fn get(&self, style: WaveformStyle) -> Option<&dyn StyleRenderer> {
        self.renderers.get(&style).map(|renderer| renderer.as_ref())
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Stacked blocks rising from the bottom of the area, or from its middle
/// when mirrored.
pub struct BarsStyle;

impl StyleRenderer for BarsStyle {
    fn draw(&self, surface: &mut dyn Surface, f: &StyleFrame<'_>) {
        let n = f.bar_count();
        if n == 0 {
            return;
        }
        let gap = 2.0 * f.scale;
        let block = 4.0 * f.scale;
        let step = block + gap;
        let bar_width = f.area.width / n as f32 - gap;
        let paint = f.paint();

        for i in 0..n {
            let amp = f.amplitude(i);
            let x = f.area.x + i as f32 * (bar_width + gap);
            let height = amp * f.area.height + f.beat_glow * 30.0 * f.scale * amp;
            let blocks = (height / step).floor() as usize;
            for j in 0..blocks {
                if f.mirror {
                    let mid = f.area.y + f.area.height / 2.0;
                    surface.fill_rect(x, mid - (j + 1) as f32 * step, bar_width, block, &paint);
                    surface.fill_rect(x, mid + j as f32 * step, bar_width, block, &paint);
                } else {
                    let y = f.area.y + f.area.height - (j + 1) as f32 * step;
                    surface.fill_rect(x, y, bar_width, block, &paint);
                }
            }
        }
    }
}

pub struct DotsStyle;

impl StyleRenderer for DotsStyle {
    fn draw(&self, surface: &mut dyn Surface, f: &StyleFrame<'_>) {
        let n = f.bar_count();
        if n == 0 {
            return;
        }
        let spacing = f.area.width / n as f32;
        let paint = f.paint();
        for i in 0..n {
            let amp = f.amplitude(i);
            let x = f.area.x + i as f32 * spacing + spacing / 2.0;
            let radius = (amp * spacing / 2.0 + f.beat_glow * amp * 0.1 * f.scale).max(2.0 * f.scale);
            if f.mirror {
                let mid = f.area.y + f.area.height / 2.0;
                let reach = amp * f.area.height / 2.0;
                surface.fill_circle(x, mid - reach, radius, &paint);
                surface.fill_circle(x, mid + reach, radius, &paint);
            } else {
                let y = f.area.y + f.area.height - amp * f.area.height;
                surface.fill_circle(x, y, radius, &paint);
            }
        }
    }
}

/// Filled curve through the bar tops.
pub struct WavesStyle;

impl StyleRenderer for WavesStyle {
    fn draw(&self, surface: &mut dyn Surface, f: &StyleFrame<'_>) {
        let n = f.bar_count();
        if n < 2 {
            return;
        }
        let spacing = f.area.width / (n - 1) as f32;
        let bottom = f.area.y + f.area.height;
        let mid = f.area.y + f.area.height / 2.0;
        let pulse = f.beat_glow * f.scale;

        let top: Vec<(f32, f32)> = (0..n)
            .map(|i| {
                let amp = f.amplitude(i);
                let x = f.area.x + i as f32 * spacing;
                let y = if f.mirror {
                    mid - amp * f.area.height / 2.0 - pulse * amp * 0.5
                } else {
                    bottom - amp * f.area.height - pulse * amp
                };
                (x, y)
            })
            .collect();

        let mut outline = smooth_curve(&top);
        if f.mirror {
            let lower: Vec<(f32, f32)> = top.iter().rev().map(|&(x, y)| (x, 2.0 * mid - y)).collect();
            outline.extend(smooth_curve(&lower));
        } else {
            outline.push((f.area.x + f.area.width, bottom));
            outline.push((f.area.x, bottom));
        }

        let fill = Paint::solid(f.color).with_alpha(f.alpha * 0.25);
        surface.fill_polygon(&outline, &fill);
        let mut closed = outline.clone();
        closed.push(outline[0]);
        surface.stroke_polyline(&closed, 3.0 * f.scale, &f.paint());
    }
}

/// Hue-graded bars, red through yellow across the range.
pub struct SpectrumStyle;

impl StyleRenderer for SpectrumStyle {
    fn draw(&self, surface: &mut dyn Surface, f: &StyleFrame<'_>) {
        let n = f.bar_count();
        if n == 0 {
            return;
        }
        let gap = f.scale;
        let bar_width = f.area.width / n as f32 - gap;
        for i in 0..n {
            let amp = f.amplitude(i);
            let x = f.area.x + i as f32 * (bar_width + gap);
            let height = amp * f.area.height + f.beat_glow * amp * f.scale;
            let hue = (i as f32 / n as f32) * 60.0 + 10.0;
            let paint = Paint::solid(Color::from_hsl(hue, 1.0, 0.5))
                .with_alpha(f.alpha)
                .with_glow(f.glow);
            let y = if f.mirror {
                f.area.y + f.area.height / 2.0 - height / 2.0
            } else {
                f.area.y + f.area.height - height
            };
            surface.fill_rect(x, y, bar_width, height, &paint);
        }
    }
}

/// Ring of bars radiating from a rotating circle.
pub struct CircularStyle;

impl StyleRenderer for CircularStyle {
    fn draw(&self, surface: &mut dyn Surface, f: &StyleFrame<'_>) {
        let n = f.bar_count();
        if n == 0 {
            return;
        }
        let cx = f.area.x + f.area.width / 2.0;
        let cy = f.area.y + f.area.height / 2.0;
        let short = f.area.width.min(f.area.height);
        let radius = short * 0.2 + f.beat_glow * 0.5 * f.scale;
        let max_bar = short * 0.3;
        let paint = f.paint();

        let ring: Vec<(f32, f32)> = (0..=64)
            .map(|k| {
                let a = k as f32 / 64.0 * TAU;
                (cx + radius * a.cos(), cy + radius * a.sin())
            })
            .collect();
        surface.stroke_polyline(&ring, 2.0 * f.scale, &paint);

        let half_width = 2.0 * f.scale;
        for i in 0..n {
            let angle = f.rotation + i as f32 * TAU / n as f32;
            let length = f.amplitude(i) * max_bar;
            if length <= 0.0 {
                continue;
            }
            // bar runs along the rotated +y axis, as a canvas rotate() would
            let (sin, cos) = angle.sin_cos();
            let along = (-sin, cos);
            let across = (cos, sin);
            let corner = |r: f32, w: f32| {
                (
                    cx + along.0 * r + across.0 * w,
                    cy + along.1 * r + across.1 * w,
                )
            };
            let quad = [
                corner(radius, -half_width),
                corner(radius, half_width),
                corner(radius + length, half_width),
                corner(radius + length, -half_width),
            ];
            surface.fill_polygon(&quad, &paint);
        }
    }
}

/// Curve whose points sway with time in proportion to their energy.
pub struct AnimatedLineStyle;

impl StyleRenderer for AnimatedLineStyle {
    fn draw(&self, surface: &mut dyn Surface, f: &StyleFrame<'_>) {
        let n = f.bar_count();
        if n < 2 {
            return;
        }
        let spacing = f.area.width / (n - 1) as f32;
        let mid = f.area.y + f.area.height / 2.0;
        let paint = Paint::solid(f.color)
            .with_alpha(f.alpha)
            .with_glow(f.glow.max(15.0 * f.scale));

        let line = |below: bool| -> Vec<(f32, f32)> {
            let sign = if below { 1.0 } else { -1.0 };
            let points: Vec<(f32, f32)> = (0..n)
                .map(|i| {
                    let amp = f.amplitude(i);
                    let osc = (f.ticks * 0.005 + i as f32 * 0.2).sin() * amp * 20.0 * f.scale;
                    let offset = amp * f.area.height / 2.0 + osc + f.beat_glow * amp * 0.5 * f.scale;
                    (f.area.x + i as f32 * spacing, mid + sign * offset)
                })
                .collect();
            smooth_curve(&points)
        };

        surface.stroke_polyline(&line(false), 4.0 * f.scale, &paint);
        if f.mirror {
            surface.stroke_polyline(&line(true), 4.0 * f.scale, &paint);
        }
    }
}

const CURVE_STEPS: usize = 6;

/// Quadratic segments between successive points, each with its control
/// point at the horizontal midpoint and the previous point's height.
fn smooth_curve(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(points.len() * CURVE_STEPS + 1);
    out.push(first);
    for pair in points.windows(2) {
        let (p0, p2) = (pair[0], pair[1]);
        let p1 = ((p0.0 + p2.0) / 2.0, p0.1);
        for step in 1..=CURVE_STEPS {
            let t = step as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            out.push((
                u * u * p0.0 + 2.0 * u * t * p1.0 + t * t * p2.0,
                u * u * p0.1 + 2.0 * u * t * p1.1 + t * t * p2.1,
            ));
        }
    }
    out
}
