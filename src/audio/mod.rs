pub mod analyser;
pub mod bands;
pub mod beat;
pub mod decode;
pub mod features;
pub mod smoothing;
pub mod source;
pub mod timeline;

pub use analyser::{SpectrumAnalyser, FFT_SIZE};
pub use beat::{BeatDetector, BeatReading};
pub use decode::{decode_audio, AudioData};
pub use features::{BarProfile, ChannelView, FrequencyBands, MagnitudeSnapshot};
pub use smoothing::SmoothingEngine;
pub use source::{LiveSpectrum, PrecomputedSpectrum, SpectralSource};
pub use timeline::{Timeline, TimelineBuilder, TimelineEntry};
