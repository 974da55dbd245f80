use serde::Deserialize;
use std::path::{Path, PathBuf};

use beatframe::encode::EncoderOptions;
use beatframe::settings::{ExportSettings, VisualSettings};

const CONFIG_NAME: &str = "beatframe.toml";

/// Defaults read from `beatframe.toml`. Command-line flags win over these.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub visual: VisualSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub encoder: EncoderOptions,
}

/// Explicit path, else `./beatframe.toml`, else the per-user config.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_NAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("beatframe").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("beatframe").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Option<Config> {
    match toml::from_str(content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Config parse error: {}", e);
            None
        }
    }
}
