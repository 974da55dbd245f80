//! Beat-driven particle bursts drawn over the waveform.
//!
//! Particles live in native template coordinates and are scaled on draw, so
//! every resolution tier shows the same burst. The generator is seeded, and
//! [`ParticleField::reset`] rewinds it, which keeps repeated exports
//! identical.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::settings::{Color, VisualSettings};

use super::surface::{Paint, Surface};

const SEED: u64 = 0x6265_6174_6672_616d;

/// Bursts fire only above this beat intensity.
pub const EMIT_THRESHOLD: f32 = 0.5;

/// Life lost per 60 Hz tick.
const LIFE_STEP: f32 = 0.02;

/// Half-width of the square around the centre that particles spawn in.
const SPAWN_SPREAD: f32 = 50.0;

/// Peak speed per unit of intensity, in pixels per tick.
const SPEED: f32 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub max_life: f32,
    pub size: f32,
    pub color: Color,
}

#[derive(Clone, Debug)]
pub struct ParticleField {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl Default for ParticleField {
    fn default() -> Self {
        Self {
            particles: Vec::new(),
            rng: StdRng::seed_from_u64(SEED),
        }
    }
}

impl ParticleField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Drop live particles and rewind the generator.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Emit on a strong beat, then move and age every particle by `ratio`
    /// 60 Hz ticks. Particles that fade out or leave the
    /// `width` x `height` frame are dropped.
    pub fn step(&mut self, width: f32, height: f32, settings: &VisualSettings, intensity: f32, ratio: f32) {
        if !settings.particles {
            self.particles.clear();
            return;
        }

        if intensity > EMIT_THRESHOLD && self.rng.gen::<f32>() > 0.5 {
            let count = (intensity * 10.0).floor() as usize;
            for _ in 0..count {
                let particle = self.spawn(width, height, settings, intensity);
                self.particles.push(particle);
            }
        }

        self.particles.retain_mut(|p| {
            p.x += p.vx * ratio;
            p.y += p.vy * ratio;
            p.life -= LIFE_STEP * ratio;
            p.life > 0.0 && (0.0..=width).contains(&p.x) && (0.0..=height).contains(&p.y)
        });
    }

    fn spawn(&mut self, width: f32, height: f32, settings: &VisualSettings, intensity: f32) -> Particle {
        let rng = &mut self.rng;
        Particle {
            x: width / 2.0 + (rng.gen::<f32>() - 0.5) * SPAWN_SPREAD * 2.0,
            y: height / 2.0 + (rng.gen::<f32>() - 0.5) * SPAWN_SPREAD * 2.0,
            vx: (rng.gen::<f32>() - 0.5) * SPEED * intensity,
            vy: (rng.gen::<f32>() - 0.5) * SPEED * intensity,
            life: 1.0,
            max_life: 1.0 + rng.gen::<f32>() * 0.5,
            size: rng.gen::<f32>() * 4.0 + 1.0,
            color: if rng.gen::<f32>() > 0.5 {
                settings.primary_color
            } else {
                settings.secondary_color
            },
        }
    }

    /// Paint every particle, shrinking and fading with its remaining life.
    pub fn draw(&self, surface: &mut dyn Surface, scale: f32) {
        for p in &self.particles {
            let paint = Paint::solid(p.color).with_alpha(p.life / p.max_life);
            surface.fill_circle(p.x * scale, p.y * scale, p.size * p.life * scale, &paint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::RasterSurface;

    const W: f32 = 1080.0;
    const H: f32 = 1920.0;

    fn enabled() -> VisualSettings {
        VisualSettings {
            particles: true,
            ..Default::default()
        }
    }

    fn still(x: f32, y: f32) -> Particle {
        Particle {
            x,
            y,
            vx: 3.0,
            vy: -2.0,
            life: 1.0,
            max_life: 1.0,
            size: 4.0,
            color: Color::rgb(255, 0, 0),
        }
    }

    #[test]
    fn weak_beats_emit_nothing() {
        let mut field = ParticleField::new();
        for _ in 0..100 {
            field.step(W, H, &enabled(), EMIT_THRESHOLD, 1.0);
        }
        assert!(field.particles().is_empty());
    }

    #[test]
    fn strong_beats_emit_then_fade_out() {
        let settings = enabled();
        let mut field = ParticleField::new();
        for _ in 0..40 {
            field.step(W, H, &settings, 1.5, 1.0);
        }
        assert!(!field.particles().is_empty());
        for p in field.particles() {
            assert!(p.color == settings.primary_color || p.color == settings.secondary_color);
            assert!((1.0..=5.0).contains(&p.size));
        }

        for _ in 0..60 {
            field.step(W, H, &settings, 0.0, 1.0);
        }
        assert!(field.particles().is_empty());
    }

    #[test]
    fn tick_ratio_scales_motion_and_fade() {
        let mut once = ParticleField::new();
        once.particles.push(still(100.0, 100.0));
        once.step(W, H, &enabled(), 0.0, 2.0);

        let mut twice = ParticleField::new();
        twice.particles.push(still(100.0, 100.0));
        twice.step(W, H, &enabled(), 0.0, 1.0);
        twice.step(W, H, &enabled(), 0.0, 1.0);

        let (a, b) = (once.particles()[0], twice.particles()[0]);
        assert!((a.x - 106.0).abs() < 1e-4);
        assert!((a.y - 96.0).abs() < 1e-4);
        assert!((a.life - 0.96).abs() < 1e-6);
        assert!((a.x - b.x).abs() < 1e-4 && (a.life - b.life).abs() < 1e-6);
    }

    #[test]
    fn particles_leaving_the_frame_are_dropped() {
        let mut field = ParticleField::new();
        field.particles.push(still(W - 1.0, 10.0));
        field.step(W, H, &enabled(), 0.0, 1.0);
        assert!(field.particles().is_empty());
    }

    #[test]
    fn reset_replays_the_same_bursts() {
        let settings = enabled();
        let mut field = ParticleField::new();
        let run = |field: &mut ParticleField| {
            for _ in 0..20 {
                field.step(W, H, &settings, 1.2, 0.5);
            }
            field.particles().to_vec()
        };
        let first = run(&mut field);
        field.reset();
        assert!(field.particles().is_empty());
        assert_eq!(run(&mut field), first);
    }

    #[test]
    fn disabling_clears_live_particles() {
        let mut field = ParticleField::new();
        field.particles.push(still(100.0, 100.0));
        field.step(W, H, &VisualSettings::default(), 2.0, 1.0);
        assert!(field.particles().is_empty());
    }

    #[test]
    fn draws_at_the_scaled_position() {
        let mut field = ParticleField::new();
        field.particles.push(still(50.0, 50.0));
        let mut surface = RasterSurface::new(200, 200).unwrap();
        surface.clear(Color::rgb(0, 0, 0));
        field.draw(&mut surface, 2.0);
        assert_eq!(surface.pixel(100, 100), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(20, 20), Some([0, 0, 0, 255]));
    }
}
