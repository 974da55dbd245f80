use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::{ResolutionTier, VisualSettings};

/// Target social platform; picks the native frame size and waveform area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum Platform {
    #[default]
    Youtube,
    Reels,
    Tiktok,
    Twitter,
    Square,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Self::Youtube,
        Self::Reels,
        Self::Tiktok,
        Self::Twitter,
        Self::Square,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Youtube => "YouTube (16:9)",
            Self::Reels => "IG Reels (9:16)",
            Self::Tiktok => "TikTok (9:16)",
            Self::Twitter => "Twitter (16:9)",
            Self::Square => "Square (1:1)",
        }
    }

    pub fn template(self) -> PlatformTemplate {
        let (width, height) = match self {
            Self::Youtube | Self::Twitter => (3840, 2160),
            Self::Reels | Self::Tiktok => (2160, 3840),
            Self::Square => (2160, 2160),
        };
        let (w, h) = (width as f32, height as f32);
        let waveform_area = match self {
            Self::Youtube | Self::Twitter => Area::new(w * 0.1, h * 0.7, w * 0.8, h * 0.2),
            Self::Reels | Self::Tiktok => Area::new(w * 0.1, h * 0.8, w * 0.8, h * 0.15),
            Self::Square => Area::new(w * 0.1, h * 0.75, w * 0.8, h * 0.2),
        };
        PlatformTemplate {
            platform: self,
            width,
            height,
            waveform_area,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Youtube => "YOUTUBE",
            Self::Reels => "REELS",
            Self::Tiktok => "TIKTOK",
            Self::Twitter => "TWITTER",
            Self::Square => "SQUARE",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Area {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    fn scaled(self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// Native (4K) geometry of one platform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlatformTemplate {
    pub platform: Platform,
    pub width: u32,
    pub height: u32,
    pub waveform_area: Area,
}

/// Resolved output geometry for one render.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    /// Output width over native template width; multiplies every drawing
    /// constant so smaller tiers look like the native frame.
    pub scale: f32,
    pub waveform_area: Area,
}

impl FrameLayout {
    pub fn new(platform: Platform, tier: ResolutionTier) -> Self {
        let template = platform.template();
        let width = even(template.width as f64 * tier.scale());
        let height = even(template.height as f64 * tier.scale());
        let scale = width as f32 / template.width as f32;
        Self {
            width,
            height,
            scale,
            waveform_area: template.waveform_area.scaled(scale),
        }
    }

    /// Native-size layout used by the live preview.
    pub fn native(platform: Platform) -> Self {
        Self::new(platform, ResolutionTier::Uhd)
    }

    /// Waveform area after the user's scale and offset, and split into
    /// halves when stereo is on.
    pub fn waveform_rect(&self, settings: &VisualSettings, right_channel: bool) -> Area {
        let base = self.waveform_area;
        let cx = base.x + base.width / 2.0;
        let cy = base.y + base.height / 2.0;
        let width = base.width * settings.waveform_scale;
        let height = base.height * settings.waveform_scale;
        let x = cx - width / 2.0 + self.width as f32 * (settings.waveform_offset_x / 100.0);
        let y = cy - height / 2.0 + self.height as f32 * (settings.waveform_offset_y / 100.0);

        if !settings.stereo_mode {
            return Area::new(x, y, width, height);
        }
        let gap = 10.0 * self.scale;
        let half = width / 2.0 - 2.0 * gap;
        let x = if right_channel { x + width / 2.0 + gap } else { x };
        Area::new(x, y, half, height)
    }
}

/// Round to the nearest even pixel count, at least 2.
fn even(value: f64) -> u32 {
    (((value / 2.0).round() as u32) * 2).max(2)
}
