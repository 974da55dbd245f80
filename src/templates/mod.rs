pub mod platform;

pub use platform::{Area, FrameLayout, Platform, PlatformTemplate};
