pub mod frame;
pub mod particles;
pub mod styles;
pub mod surface;

pub use frame::{advance, draw_frame, render_frame, FrameAnalysis, FrameInput, VisualRunState};
pub use particles::{Particle, ParticleField};
pub use styles::{StyleFrame, StyleRegistry, StyleRenderer};
pub use surface::{Paint, RasterSurface, RasterSurfaceFactory, Surface, SurfaceFactory};
