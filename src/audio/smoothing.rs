use super::features::BarProfile;

const MIN_LAYERS: usize = 10;

/// Blend weight toward the fresh profile for a given decay time.
///
/// `1 - decay × 0.9`, clamped to `[0, 1]`: short decays snap, long decays
/// trail.
pub fn smooth_factor(decay_time: f32) -> f32 {
    (1.0 - decay_time * 0.9).clamp(0.0, 1.0)
}

/// Decay-weighted bar histories: layer 0 follows the signal through a
/// first-order low-pass, layers `1..n` hold the previous frames' layer 0 as a
/// trailing echo. In stereo the right channel's layers start at index `n`.
#[derive(Clone, Debug, Default)]
pub struct SmoothingEngine {
    layers: Vec<Vec<f32>>,
    width: usize,
}

impl SmoothingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all layers; the next update reallocates them.
    pub fn reset(&mut self) {
        self.layers.clear();
        self.width = 0;
    }

    pub fn update(
        &mut self,
        raw: &BarProfile,
        raw_right: Option<&BarProfile>,
        multiple_waveforms: usize,
        decay_time: f32,
    ) {
        let count = multiple_waveforms.max(1);
        let width = raw.len();

        if self.layers.is_empty() || self.width != width {
            // Width changed: history is discarded.
            self.layers = vec![vec![0.0; width]; MIN_LAYERS.max(count * 2)];
            self.width = width;
        } else {
            while self.layers.len() < count * 2 {
                self.layers.push(vec![0.0; width]);
            }
        }

        for i in (1..count).rev() {
            self.shift(i - 1, i);
            if raw_right.is_some() {
                self.shift(i - 1 + count, i + count);
            }
        }

        let factor = smooth_factor(decay_time);
        blend(&mut self.layers[0], raw, factor);
        if let Some(right) = raw_right {
            blend(&mut self.layers[count], right, factor);
        }
    }

    pub fn layers(&self) -> &[Vec<f32>] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&[f32]> {
        self.layers.get(index).map(Vec::as_slice)
    }

    /// Right-channel counterpart of `index` when `multiple_waveforms` layers
    /// are active.
    pub fn right_layer(&self, index: usize, multiple_waveforms: usize) -> Option<&[f32]> {
        self.layer(index + multiple_waveforms.max(1))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn shift(&mut self, from: usize, to: usize) {
        let (head, tail) = self.layers.split_at_mut(to);
        tail[0].copy_from_slice(&head[from]);
    }
}

fn blend(layer: &mut [f32], raw: &[f32], factor: f32) {
    for (value, &target) in layer.iter_mut().zip(raw) {
        *value += (target - *value) * factor;
    }
}
