pub mod ffmpeg;

use std::path::Path;

use crate::error::Result;

pub use ffmpeg::{EncoderOptions, FfmpegEncoder};

/// Zero-padded width of the frame index in intermediate file names.
pub const FRAME_INDEX_DIGITS: usize = 6;

/// Name of intermediate still `index`, e.g. `frame_000042.png`.
pub fn frame_name(index: usize, extension: &str) -> String {
    format!("frame_{index:0width$}.{extension}", width = FRAME_INDEX_DIGITS)
}

/// Sink for rendered stills that muxes them with audio into a video.
///
/// Frames arrive strictly in index order and `encode` is called once, after
/// the last write.
pub trait VideoEncoder {
    fn write_frame(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Mux `frames` (already written, in order) with `audio` at `frame_rate`
    /// and return the container bytes.
    fn encode(&mut self, frames: &[String], audio: &Path, frame_rate: u32) -> Result<Vec<u8>>;

    fn delete_frame(&mut self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_sort_in_index_order() {
        assert_eq!(frame_name(0, "png"), "frame_000000.png");
        assert_eq!(frame_name(59, "jpg"), "frame_000059.jpg");
        let mut names: Vec<String> = [100, 9, 10].iter().map(|&i| frame_name(i, "png")).collect();
        names.sort();
        assert_eq!(names, vec![frame_name(9, "png"), frame_name(10, "png"), frame_name(100, "png")]);
    }
}
