use serde::Serialize;

use super::analyser::SpectrumAnalyser;
use super::decode::AudioData;
use super::features::MagnitudeSnapshot;
use crate::error::Result;

pub const BLOCK_SIZE: usize = 2048;

/// Slots examined either side of the predicted index.
const SEARCH_RADIUS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub time: f64,
    pub main: MagnitudeSnapshot,
    pub left: MagnitudeSnapshot,
    pub right: MagnitudeSnapshot,
}

/// Snapshots of a whole track at a fixed block cadence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    sample_rate: u32,
    block_size: usize,
    duration: f64,
}

impl Timeline {
    /// Analyse `audio` with the default block size.
    pub fn build(audio: &AudioData) -> Result<Self> {
        TimelineBuilder::new(BLOCK_SIZE).build(audio)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Length of the analysed track in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Seconds covered by one block.
    pub fn block_duration(&self) -> f64 {
        self.block_size as f64 / self.sample_rate as f64
    }

    pub fn bin_count(&self) -> usize {
        self.entries.first().map_or(0, |e| e.main.len())
    }

    /// Index the fixed cadence puts `time` at.
    pub fn predicted_index(&self, time: f64) -> usize {
        let raw = (time.max(0.0) * self.sample_rate as f64 / self.block_size as f64).round();
        (raw as usize).min(self.entries.len().saturating_sub(1))
    }

    /// Entry whose time is closest to `time`, searching only a few slots
    /// around the predicted index. Ties go to the earlier entry.
    pub fn nearest(&self, time: f64) -> Option<&TimelineEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let center = self.predicted_index(time);
        let start = center.saturating_sub(SEARCH_RADIUS);
        let end = (center + SEARCH_RADIUS + 1).min(self.entries.len());

        let mut best = &self.entries[start];
        for entry in &self.entries[start + 1..end] {
            if (entry.time - time).abs() < (best.time - time).abs() {
                best = entry;
            }
        }
        Some(best)
    }
}

/// Offline pass that turns a decoded track into a [`Timeline`].
///
/// Entry `k` sits at `k × block_size / sample_rate` and describes the
/// analyser window ending at that sample, which is what a live analyser
/// would report at the same playback position. The pass never reads a
/// clock, so identical input always yields an identical timeline.
pub struct TimelineBuilder {
    block_size: usize,
}

impl TimelineBuilder {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    pub fn build(&self, audio: &AudioData) -> Result<Timeline> {
        audio.validate()?;

        let sample_rate = audio.sample_rate;
        let frames = audio.frames();
        let blocks = frames.div_ceil(self.block_size);

        let mut main = SpectrumAnalyser::new(sample_rate);
        let mut left = SpectrumAnalyser::new(sample_rate);
        let mut right = SpectrumAnalyser::new(sample_rate);
        let fft_size = main.bin_count() * 2;

        let mut mix = vec![0.0f32; fft_size];
        let mut entries = Vec::with_capacity(blocks + 1);

        for k in 0..=blocks {
            let end = (k * self.block_size).min(frames);
            let start = end.saturating_sub(fft_size);

            mix.clear();
            mix.extend((start..end).map(|i| audio.mix_at(i)));

            entries.push(TimelineEntry {
                time: (k * self.block_size) as f64 / sample_rate as f64,
                main: main.analyse(&mix),
                left: left.analyse(&audio.left()[start..end]),
                right: right.analyse(&audio.right()[start..end]),
            });
        }

        log::info!(
            "Timeline: {} entries, block {} samples ({:.1}ms)",
            entries.len(),
            self.block_size,
            self.block_size as f64 * 1000.0 / sample_rate as f64
        );

        Ok(Timeline {
            entries,
            sample_rate,
            block_size: self.block_size,
            duration: audio.duration(),
        })
    }
}
