//! Reduction of magnitude snapshots to named bands and bar profiles.
//!
//! Everything here is a pure function of the snapshot so the live preview and
//! the offline export derive identical values from the same audio moment.

use std::ops::Range;

use super::features::{BarProfile, FrequencyBands, MagnitudeSnapshot};

pub const BASS_HZ: (f32, f32) = (0.0, 200.0);
pub const KICK_HZ: (f32, f32) = (50.0, 100.0);
pub const SNARE_HZ: (f32, f32) = (2000.0, 5000.0);

pub fn reduce_to_bands(snapshot: &MagnitudeSnapshot) -> FrequencyBands {
    FrequencyBands {
        bass: band_average(snapshot, BASS_HZ),
        kick: band_average(snapshot, KICK_HZ),
        snare: band_average(snapshot, SNARE_HZ),
    }
}

/// Mean magnitude over the bins covering `[low, high]` Hz, inclusive of both
/// edge bins.
pub fn band_average(snapshot: &MagnitudeSnapshot, (low, high): (f32, f32)) -> f32 {
    let bins = snapshot.bins();
    let bin_hz = snapshot.bin_hz();
    if bins.is_empty() || bin_hz <= 0.0 {
        return 0.0;
    }

    let last = bins.len() - 1;
    let start = ((low / bin_hz).floor().max(0.0) as usize).min(last);
    let end = ((high / bin_hz).ceil().max(0.0) as usize).min(last);
    if start > end {
        return 0.0;
    }

    let sum: u32 = bins[start..=end].iter().map(|&b| b as u32).sum();
    sum as f32 / (end - start + 1) as f32
}

/// Bin ranges of the logarithmic buckets for a snapshot of `len` bins.
///
/// Bucket `i` covers `floor(10^(i/n * L))..=floor(10^((i+1)/n * L))` with
/// `L = log10(len-1)`, so the DC bin is never used and the top bucket ends on
/// the last bin. Neighbouring buckets share their boundary bin, and narrow low
/// buckets repeat a single bin rather than going empty.
pub fn bar_ranges(len: usize, bar_count: usize) -> Vec<Range<usize>> {
    if len < 2 {
        return vec![0..0; bar_count];
    }

    let last = len - 1;
    let max_log = (last as f64).log10();
    let edge = |i: usize| {
        let log = (i as f64 / bar_count as f64) * max_log;
        (10f64.powf(log).floor() as usize).clamp(1, last)
    };

    (0..bar_count)
        .map(|i| {
            let start = edge(i);
            let end = if i + 1 == bar_count { last } else { edge(i + 1) };
            start..end.max(start) + 1
        })
        .collect()
}

pub fn reduce_to_bars(snapshot: &MagnitudeSnapshot, bar_count: usize) -> BarProfile {
    let bins = snapshot.bins();
    bar_ranges(bins.len(), bar_count)
        .into_iter()
        .map(|range| {
            if range.is_empty() {
                return 0.0;
            }
            let count = range.len();
            let sum: u32 = bins[range].iter().map(|&b| b as u32).sum();
            sum as f32 / count as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bins: Vec<u8>, sample_rate: u32) -> MagnitudeSnapshot {
        MagnitudeSnapshot::new(bins, sample_rate)
    }

    #[test]
    fn bands_average_their_hz_ranges() {
        // 1024 bins at 48 kHz: 23.4375 Hz per bin.
        let mut bins = vec![0u8; 1024];
        for b in &mut bins[2..=5] {
            *b = 200;
        }
        let bands = reduce_to_bands(&snapshot(bins, 48_000));
        // kick covers bins 2..=5 (50/23.4 floor, 100/23.4 ceil)
        assert_eq!(bands.kick, 200.0);
        // bass covers bins 0..=9
        assert_eq!(bands.bass, 200.0 * 4.0 / 10.0);
        assert_eq!(bands.snare, 0.0);
    }

    #[test]
    fn band_ranges_clamp_to_snapshot() {
        // 8 kHz over 8 bins is 500 Hz per bin: the snare range starts at bin 4
        // and its upper edge clamps to the last bin.
        let bins = vec![0, 0, 0, 0, 0, 0, 0, 90];
        let bands = reduce_to_bands(&snapshot(bins, 8_000));
        assert_eq!(bands.snare, 22.5);
        assert_eq!(reduce_to_bands(&snapshot(vec![], 8_000)), FrequencyBands::default());
    }

    #[test]
    fn bar_ranges_cover_one_to_last_bin() {
        for &(len, bars) in &[(1024usize, 40usize), (1024, 64), (1024, 7), (16, 40), (2, 3)] {
            let ranges = bar_ranges(len, bars);
            assert_eq!(ranges.len(), bars);
            assert_eq!(ranges[0].start, 1, "len {len} bars {bars}");
            assert_eq!(ranges[bars - 1].end, len);
            for range in &ranges {
                assert!(!range.is_empty());
                assert!(range.start >= 1 && range.end <= len);
            }
            // buckets only meet at a shared boundary bin
            assert!(ranges.windows(2).all(|w| w[1].start + 1 >= w[0].end && w[1].start >= w[0].start));
            let mut hit = vec![false; len];
            for range in &ranges {
                range.clone().for_each(|bin| hit[bin] = true);
            }
            assert!(!hit[0]);
            assert!(hit[1..].iter().all(|&h| h), "len {len} bars {bars}");
        }
        assert_eq!(bar_ranges(1, 4), vec![0..0; 4]);
        assert!(bar_ranges(1024, 0).is_empty());
    }

    #[test]
    fn dc_bin_never_reaches_a_bar() {
        let mut bins = vec![0u8; 1024];
        bins[0] = 255;
        let bars = reduce_to_bars(&snapshot(bins, 44_100), 40);
        assert!(bars.iter().all(|&b| b == 0.0), "{bars:?}");
    }

    #[test]
    fn lowest_bars_repeat_the_first_bin() {
        let mut bins = vec![0u8; 1024];
        bins[1] = 200;
        let bars = reduce_to_bars(&snapshot(bins, 44_100), 40);
        assert_eq!(&bars[..3], &[200.0, 200.0, 200.0]);
        assert!(bars[10..].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn bar_ranges_are_deterministic() {
        assert_eq!(bar_ranges(1024, 40), bar_ranges(1024, 40));
        let snap = snapshot((0..1024).map(|i| (i % 256) as u8).collect(), 44_100);
        assert_eq!(reduce_to_bars(&snap, 40), reduce_to_bars(&snap, 40));
    }

    #[test]
    fn bars_average_their_buckets() {
        let snap = snapshot(vec![100u8; 1024], 44_100);
        let bars = reduce_to_bars(&snap, 40);
        assert_eq!(bars.len(), 40);
        assert!(bars.iter().all(|&b| b == 100.0));
        assert!(reduce_to_bars(&snap, 0).is_empty());
    }
}
