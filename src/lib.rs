//! Audio-reactive waveform rendering with offline video export.
//!
//! The same per-frame update drives both the live preview
//! ([`live::LiveScheduler`]) and the frame-accurate exporter
//! ([`export::ExportSequencer`]); only the spectral source differs.

pub mod audio;
pub mod encode;
pub mod error;
pub mod export;
pub mod live;
pub mod render;
pub mod settings;
pub mod templates;

pub use error::{ExportError, Result};
