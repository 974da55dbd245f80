use super::features::FrequencyBands;

pub const HISTORY_CAPACITY: usize = 60;
pub const REFRACTORY_MS: f64 = 250.0;

const KICK_FLOOR: f32 = 150.0;
const KICK_MULTIPLIER: f32 = 1.3;
const BASS_FLOOR: f32 = 130.0;
const BASS_MULTIPLIER: f32 = 1.2;
const SNARE_FLOOR: f32 = 50.0;
const SNARE_MULTIPLIER: f32 = 1.2;
const SNARE_RANGE: f32 = 100.0;

/// Fixed-capacity ring of recent band energies.
#[derive(Clone, Debug)]
pub struct BandHistory {
    values: [f32; HISTORY_CAPACITY],
    write: usize,
    len: usize,
}

impl Default for BandHistory {
    fn default() -> Self {
        Self {
            values: [0.0; HISTORY_CAPACITY],
            write: 0,
            len: 0,
        }
    }
}

impl BandHistory {
    /// Append a value, evicting the oldest once full.
    pub fn push(&mut self, value: f32) {
        self.values[self.write] = value;
        self.write = (self.write + 1) % HISTORY_CAPACITY;
        self.len = (self.len + 1).min(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.write = 0;
        self.len = 0;
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let start = (self.write + HISTORY_CAPACITY - self.len) % HISTORY_CAPACITY;
        (0..self.len).map(move |i| self.values[(start + i) % HISTORY_CAPACITY])
    }

    /// Moving average; an empty history averages to zero.
    pub fn mean(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.len as f32
    }
}

/// Onsets found for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BeatReading {
    pub kick: bool,
    pub bass: bool,
    /// Continuous snare intensity in 0..=1.
    pub snare: f32,
}

impl BeatReading {
    /// Whether this frame should light the beat glow.
    pub fn is_beat(&self) -> bool {
        self.kick || self.bass || self.snare > 0.5
    }
}

/// Adaptive-threshold onset detector over kick, bass and snare energies.
///
/// Kick and bass share one refractory timer: an onset on either blocks both
/// for [`REFRACTORY_MS`].
#[derive(Clone, Debug, Default)]
pub struct BeatDetector {
    kick: BandHistory,
    bass: BandHistory,
    snare: BandHistory,
    last_onset_ms: f64,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_history(&mut self) {
        self.kick.clear();
        self.bass.clear();
        self.snare.clear();
        self.last_onset_ms = 0.0;
    }

    /// Record a frame's raw band energies.
    pub fn observe(&mut self, bands: &FrequencyBands) {
        self.kick.push(bands.kick);
        self.snare.push(bands.snare);
        self.bass.push(bands.bass);
    }

    /// Observe `bands` and then evaluate every detector against the updated
    /// history, kick before bass.
    pub fn read(&mut self, bands: &FrequencyBands, sensitivity: f32, now_ms: f64) -> BeatReading {
        self.observe(bands);
        BeatReading {
            kick: self.detect_kick(bands.kick, sensitivity, now_ms),
            bass: self.detect_bass(bands.bass, sensitivity, now_ms),
            snare: self.detect_snare(bands.snare, sensitivity),
        }
    }

    pub fn kick_threshold(&self, sensitivity: f32) -> f32 {
        threshold(&self.kick, KICK_FLOOR, KICK_MULTIPLIER, sensitivity)
    }

    pub fn bass_threshold(&self, sensitivity: f32) -> f32 {
        threshold(&self.bass, BASS_FLOOR, BASS_MULTIPLIER, sensitivity)
    }

    pub fn snare_threshold(&self, sensitivity: f32) -> f32 {
        threshold(&self.snare, SNARE_FLOOR, SNARE_MULTIPLIER, sensitivity)
    }

    pub fn detect_kick(&mut self, energy: f32, sensitivity: f32, now_ms: f64) -> bool {
        let threshold = self.kick_threshold(sensitivity);
        self.gate(energy > threshold, now_ms)
    }

    pub fn detect_bass(&mut self, energy: f32, sensitivity: f32, now_ms: f64) -> bool {
        let threshold = self.bass_threshold(sensitivity);
        self.gate(energy > threshold, now_ms)
    }

    pub fn detect_snare(&self, energy: f32, sensitivity: f32) -> f32 {
        let threshold = self.snare_threshold(sensitivity);
        if energy > threshold {
            ((energy - threshold) / SNARE_RANGE).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn last_onset_ms(&self) -> f64 {
        self.last_onset_ms
    }

    fn gate(&mut self, crossed: bool, now_ms: f64) -> bool {
        if crossed && now_ms - self.last_onset_ms >= REFRACTORY_MS {
            self.last_onset_ms = now_ms;
            true
        } else {
            false
        }
    }
}

fn threshold(history: &BandHistory, floor: f32, multiplier: f32, sensitivity: f32) -> f32 {
    floor.max(history.mean() * multiplier) / sensitivity.max(f32::EPSILON)
}
