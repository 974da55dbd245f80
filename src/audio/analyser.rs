use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::features::MagnitudeSnapshot;

pub const FFT_SIZE: usize = 2048;
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.2;
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

/// Byte spectrum analyser shared by the live and offline paths.
///
/// Each call to [`SpectrumAnalyser::analyse`] windows the most recent
/// `FFT_SIZE` samples, blends the magnitudes with the previous call's
/// (time constant 0.2) and maps -100..-30 dB onto 0..255. Using the same
/// analyser in both paths is what keeps preview and export in step.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    sample_rate: u32,
}

impl SpectrumAnalyser {
    pub fn new(sample_rate: u32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        Self {
            fft,
            window: blackman_window(FFT_SIZE),
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: vec![0.0; FFT_SIZE / 2],
            sample_rate,
        }
    }

    pub fn bin_count(&self) -> usize {
        FFT_SIZE / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Forget the temporal smoothing state.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyse the trailing `FFT_SIZE` samples of `samples`. Shorter input is
    /// treated as preceded by silence.
    pub fn analyse(&mut self, samples: &[f32]) -> MagnitudeSnapshot {
        let take = samples.len().min(FFT_SIZE);
        let pad = FFT_SIZE - take;
        let tail = &samples[samples.len() - take..];

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / FFT_SIZE as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let mut bins = vec![0u8; self.bin_count()];
        for (k, byte) in bins.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let smoothed = SMOOTHING_TIME_CONSTANT * self.smoothed[k]
                + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
            self.smoothed[k] = smoothed;
            *byte = to_byte(smoothed, range);
        }

        MagnitudeSnapshot::new(bins, self.sample_rate)
    }
}

fn to_byte(magnitude: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 / range) * (db - MIN_DECIBELS);
    scaled.floor().clamp(0.0, 255.0) as u8
}

fn blackman_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = SpectrumAnalyser::new(44_100);
        let snapshot = analyser.analyse(&vec![0.0; FFT_SIZE]);
        assert_eq!(snapshot.len(), FFT_SIZE / 2);
        assert!(snapshot.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let sample_rate = 44_100;
        let mut analyser = SpectrumAnalyser::new(sample_rate);
        let snapshot = analyser.analyse(&sine(1_000.0, 0.01, sample_rate, FFT_SIZE));
        let peak = snapshot
            .bins()
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        let expected = (1_000.0 / snapshot.bin_hz()).round() as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak {peak}, expected {expected}");
        assert!(snapshot.bins()[peak] > 100);
    }

    #[test]
    fn smoothing_carries_between_calls() {
        let sample_rate = 44_100;
        let tone = sine(440.0, 0.01, sample_rate, FFT_SIZE);
        let mut analyser = SpectrumAnalyser::new(sample_rate);
        let first = analyser.analyse(&tone);
        let second = analyser.analyse(&tone);
        let bin = (440.0 / first.bin_hz()).round() as usize;
        assert!(second.bins()[bin] >= first.bins()[bin]);

        analyser.reset();
        assert_eq!(analyser.analyse(&tone), first);
    }
}
