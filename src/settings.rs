use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ExportError, Result};
use crate::templates::Platform;

pub const SUPPORTED_FRAME_RATES: [u32; 3] = [24, 30, 60];
pub const MAX_WAVEFORM_LAYERS: usize = 4;

/// Opaque RGB colour, written as `#RRGGBB` in config files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `hue` in degrees, `saturation` and `lightness` in 0..=1.
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = lightness - c / 2.0;
        let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::rgb(to_u8(r), to_u8(g), to_u8(b))
    }
}

impl FromStr for Color {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>, double: bool| -> Result<u8> {
            let digits = hex
                .get(range)
                .ok_or_else(|| ExportError::input(format!("bad colour '{s}'")))?;
            let digits = if double { digits.repeat(2) } else { digits.to_string() };
            u8::from_str_radix(&digits, 16)
                .map_err(|_| ExportError::input(format!("bad colour '{s}'")))
        };
        match hex.len() {
            6 => Ok(Self::rgb(channel(0..2, false)?, channel(2..4, false)?, channel(4..6, false)?)),
            3 => Ok(Self::rgb(channel(0..1, true)?, channel(1..2, true)?, channel(2..3, true)?)),
            _ => Err(ExportError::input(format!("bad colour '{s}'"))),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaveformStyle {
    #[default]
    Bars,
    Dots,
    Waves,
    Spectrum,
    Circular,
    AnimatedLine,
}

impl WaveformStyle {
    pub const ALL: [WaveformStyle; 6] = [
        Self::Bars,
        Self::Dots,
        Self::Waves,
        Self::Spectrum,
        Self::Circular,
        Self::AnimatedLine,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum RotationDirection {
    #[default]
    Cw,
    Ccw,
}

/// Output size relative to the platform's native 4K template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ResolutionTier {
    #[default]
    #[serde(rename = "4K")]
    #[value(name = "4K", alias = "4k")]
    Uhd,
    #[serde(rename = "1080p")]
    #[value(name = "1080p")]
    FullHd,
    #[serde(rename = "720p")]
    #[value(name = "720p")]
    Hd,
}

impl ResolutionTier {
    pub fn scale(self) -> f64 {
        match self {
            Self::Uhd => 1.0,
            Self::FullHd => 0.5,
            Self::Hd => 1.0 / 3.0,
        }
    }
}

/// Still-image container used for intermediate frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Png,
    Jpeg,
}

impl FrameFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Everything that shapes the picture, shared by preview and export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    pub primary_color: Color,
    pub secondary_color: Color,
    pub background_color: Color,
    pub waveform_style: WaveformStyle,
    pub mirror: bool,
    /// Trailing echo layers drawn behind the live one, 1 to 4.
    pub multiple_waveforms: usize,
    pub stereo_mode: bool,
    pub waveform_scale: f32,
    /// Percent of frame width.
    pub waveform_offset_x: f32,
    /// Percent of frame height.
    pub waveform_offset_y: f32,
    pub sensitivity: f32,
    pub decay_time: f32,
    pub bar_count: usize,
    pub circular_rotation: bool,
    pub rotation_speed: f32,
    pub rotation_direction: RotationDirection,
    pub glow: bool,
    /// Beat-driven particle bursts.
    pub particles: bool,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            primary_color: Color::rgb(0xFF, 0xA5, 0x00),
            secondary_color: Color::rgb(0xFF, 0x45, 0x00),
            background_color: Color::rgb(0x05, 0x05, 0x05),
            waveform_style: WaveformStyle::Bars,
            mirror: false,
            multiple_waveforms: 1,
            stereo_mode: false,
            waveform_scale: 1.0,
            waveform_offset_x: 0.0,
            waveform_offset_y: 0.0,
            sensitivity: 1.0,
            decay_time: 0.3,
            bar_count: 40,
            circular_rotation: true,
            rotation_speed: 1.0,
            rotation_direction: RotationDirection::Cw,
            glow: true,
            particles: false,
        }
    }
}

impl VisualSettings {
    /// Copy with every field pulled into the range the pipeline supports.
    pub fn normalized(&self) -> Self {
        Self {
            multiple_waveforms: self.multiple_waveforms.clamp(1, MAX_WAVEFORM_LAYERS),
            bar_count: self.bar_count.clamp(2, 256),
            sensitivity: self.sensitivity.clamp(0.1, 10.0),
            decay_time: self.decay_time.clamp(0.0, 1.0),
            waveform_scale: self.waveform_scale.clamp(0.1, 4.0),
            waveform_offset_x: self.waveform_offset_x.clamp(-100.0, 100.0),
            waveform_offset_y: self.waveform_offset_y.clamp(-100.0, 100.0),
            rotation_speed: self.rotation_speed.max(0.0),
            ..self.clone()
        }
    }

    /// Rotation step sign.
    pub fn signed_rotation_speed(&self) -> f32 {
        match self.rotation_direction {
            RotationDirection::Cw => self.rotation_speed,
            RotationDirection::Ccw => -self.rotation_speed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub platform: Platform,
    pub resolution: ResolutionTier,
    pub frame_rate: u32,
    /// Seconds; 0 renders the whole track.
    pub duration: f64,
    pub frame_format: FrameFormat,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            platform: Platform::Youtube,
            resolution: ResolutionTier::Uhd,
            frame_rate: 30,
            duration: 15.0,
            frame_format: FrameFormat::Png,
        }
    }
}

impl ExportSettings {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_FRAME_RATES.contains(&self.frame_rate) {
            return Err(ExportError::input(format!(
                "unsupported frame rate {} (expected one of {:?})",
                self.frame_rate, SUPPORTED_FRAME_RATES
            )));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ExportError::input(format!("invalid duration {}", self.duration)));
        }
        Ok(())
    }

    /// Seconds to render for a track of `track_seconds`.
    pub fn effective_duration(&self, track_seconds: f64) -> f64 {
        if self.duration <= 0.0 {
            track_seconds
        } else {
            self.duration.min(track_seconds)
        }
    }

    pub fn total_frames(&self, track_seconds: f64) -> usize {
        (self.effective_duration(track_seconds) * self.frame_rate as f64).floor() as usize
    }
}
