use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which mix of the signal a snapshot describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelView {
    Main,
    Left,
    Right,
}

/// One instant's frequency-magnitude reading (0-255 per bin).
///
/// Bins are shared behind an `Arc`, so cloning a snapshot out of a timeline
/// does not copy the magnitudes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnitudeSnapshot {
    bins: Arc<[u8]>,
    sample_rate: u32,
}

impl MagnitudeSnapshot {
    pub fn new(bins: impl Into<Arc<[u8]>>, sample_rate: u32) -> Self {
        Self {
            bins: bins.into(),
            sample_rate,
        }
    }

    /// All-zero snapshot with `len` bins.
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0u8; len], sample_rate)
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of one bin in Hz: half the sample rate spread over the bins.
    pub fn bin_hz(&self) -> f32 {
        if self.bins.is_empty() {
            return 0.0;
        }
        (self.sample_rate as f32 / 2.0) / self.bins.len() as f32
    }
}

/// Scalar energies of the named bands, each an average in 0-255.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FrequencyBands {
    pub bass: f32,
    pub kick: f32,
    pub snare: f32,
}

/// One energy value per logarithmic frequency bucket.
pub type BarProfile = Vec<f32>;
