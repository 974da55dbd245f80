use super::analyser::{SpectrumAnalyser, FFT_SIZE};
use super::features::{ChannelView, MagnitudeSnapshot};
use super::timeline::TimelineEntry;

/// Anything that can hand out the current frequency snapshot.
///
/// The frame pipeline is written once against this trait and driven by
/// [`LiveSpectrum`] during preview and [`PrecomputedSpectrum`] during export.
pub trait SpectralSource {
    fn current_snapshot(&mut self, view: ChannelView) -> MagnitudeSnapshot;

    fn bin_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Drop held audio after a discontinuity (seek, stop).
    fn reset(&mut self) {}
}

/// Rolling buffer of the most recent `FFT_SIZE` samples.
#[derive(Clone, Debug)]
struct SampleWindow {
    samples: Vec<f32>,
    write: usize,
}

impl SampleWindow {
    fn new() -> Self {
        Self {
            samples: vec![0.0; FFT_SIZE],
            write: 0,
        }
    }

    fn push(&mut self, sample: f32) {
        self.samples[self.write] = sample;
        self.write = (self.write + 1) % FFT_SIZE;
    }

    fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.write = 0;
    }

    /// Samples oldest first.
    fn ordered(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(FFT_SIZE);
        out.extend_from_slice(&self.samples[self.write..]);
        out.extend_from_slice(&self.samples[..self.write]);
        out
    }
}

/// Live analysis fed by the playback path.
///
/// Playback pushes the samples it has just sent to the device; each snapshot
/// call analyses whatever is freshest. Nothing here blocks.
pub struct LiveSpectrum {
    main: (SampleWindow, SpectrumAnalyser),
    left: (SampleWindow, SpectrumAnalyser),
    right: (SampleWindow, SpectrumAnalyser),
    sample_rate: u32,
}

impl LiveSpectrum {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            main: (SampleWindow::new(), SpectrumAnalyser::new(sample_rate)),
            left: (SampleWindow::new(), SpectrumAnalyser::new(sample_rate)),
            right: (SampleWindow::new(), SpectrumAnalyser::new(sample_rate)),
            sample_rate,
        }
    }

    /// Feed played stereo frames. `left` and `right` must be the same length;
    /// pass the same slice twice for mono.
    pub fn push(&mut self, left: &[f32], right: &[f32]) {
        for (&l, &r) in left.iter().zip(right) {
            self.main.0.push((l + r) * 0.5);
            self.left.0.push(l);
            self.right.0.push(r);
        }
    }

    /// Forget buffered audio and analyser smoothing, e.g. after a seek.
    pub fn clear(&mut self) {
        for (window, analyser) in [&mut self.main, &mut self.left, &mut self.right] {
            window.clear();
            analyser.reset();
        }
    }
}

impl SpectralSource for LiveSpectrum {
    fn reset(&mut self) {
        self.clear();
    }

    fn current_snapshot(&mut self, view: ChannelView) -> MagnitudeSnapshot {
        let (window, analyser) = match view {
            ChannelView::Main => &mut self.main,
            ChannelView::Left => &mut self.left,
            ChannelView::Right => &mut self.right,
        };
        analyser.analyse(&window.ordered())
    }

    fn bin_count(&self) -> usize {
        FFT_SIZE / 2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Source that replays snapshots computed ahead of time.
///
/// Every [`PrecomputedSpectrum::set_snapshot`] replaces the held state; there
/// is no blending across calls. Until the first set, every view reads as
/// silence of the expected width.
#[derive(Clone, Debug)]
pub struct PrecomputedSpectrum {
    main: Option<MagnitudeSnapshot>,
    left: Option<MagnitudeSnapshot>,
    right: Option<MagnitudeSnapshot>,
    time: f64,
    bin_count: usize,
    sample_rate: u32,
}

impl PrecomputedSpectrum {
    pub fn new(bin_count: usize, sample_rate: u32) -> Self {
        Self {
            main: None,
            left: None,
            right: None,
            time: 0.0,
            bin_count,
            sample_rate,
        }
    }

    pub fn set_snapshot(
        &mut self,
        main: MagnitudeSnapshot,
        left: MagnitudeSnapshot,
        right: MagnitudeSnapshot,
        time: f64,
    ) {
        self.main = Some(main);
        self.left = Some(left);
        self.right = Some(right);
        self.time = time;
    }

    pub fn set_entry(&mut self, entry: &TimelineEntry) {
        self.set_snapshot(
            entry.main.clone(),
            entry.left.clone(),
            entry.right.clone(),
            entry.time,
        );
    }

    /// Timeline time of the held snapshot.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn clear(&mut self) {
        self.main = None;
        self.left = None;
        self.right = None;
        self.time = 0.0;
    }
}

impl SpectralSource for PrecomputedSpectrum {
    fn reset(&mut self) {
        self.clear();
    }

    fn current_snapshot(&mut self, view: ChannelView) -> MagnitudeSnapshot {
        let held = match view {
            ChannelView::Main => &self.main,
            ChannelView::Left => &self.left,
            ChannelView::Right => &self.right,
        };
        held.clone()
            .unwrap_or_else(|| MagnitudeSnapshot::silent(self.bin_count, self.sample_rate))
    }

    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precomputed_reads_silence_until_set() {
        let mut source = PrecomputedSpectrum::new(1024, 44_100);
        let snapshot = source.current_snapshot(ChannelView::Left);
        assert_eq!(snapshot.len(), 1024);
        assert!(snapshot.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn precomputed_set_replaces_wholesale() {
        let mut source = PrecomputedSpectrum::new(4, 8_000);
        let a = MagnitudeSnapshot::new(vec![1, 2, 3, 4], 8_000);
        let b = MagnitudeSnapshot::new(vec![9, 9, 9, 9], 8_000);
        source.set_snapshot(a.clone(), a.clone(), b.clone(), 0.5);
        source.set_snapshot(b.clone(), a.clone(), a.clone(), 0.75);
        assert_eq!(source.current_snapshot(ChannelView::Main), b);
        assert_eq!(source.current_snapshot(ChannelView::Right), a);
        assert_eq!(source.time(), 0.75);
        source.clear();
        assert!(source.current_snapshot(ChannelView::Main).bins().iter().all(|&v| v == 0));
    }

    #[test]
    fn live_reflects_pushed_audio() {
        let sample_rate = 44_100;
        let mut live = LiveSpectrum::new(sample_rate);
        assert!(live.current_snapshot(ChannelView::Main).bins().iter().all(|&b| b == 0));

        let tone: Vec<f32> = (0..FFT_SIZE)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 100.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let silence = vec![0.0; FFT_SIZE];
        live.push(&tone, &silence);

        let left = live.current_snapshot(ChannelView::Left);
        let right = live.current_snapshot(ChannelView::Right);
        assert!(left.bins().iter().any(|&b| b > 0));
        assert!(right.bins().iter().all(|&b| b == 0));

        live.clear();
        assert!(live.current_snapshot(ChannelView::Left).bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn window_orders_oldest_first() {
        let mut window = SampleWindow::new();
        for i in 0..(FFT_SIZE + 3) {
            window.push(i as f32);
        }
        let ordered = window.ordered();
        assert_eq!(ordered[0], 3.0);
        assert_eq!(ordered[FFT_SIZE - 1], (FFT_SIZE + 2) as f32);
    }
}
