//! Client configuration and persisted user preferences.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ocr::OcrLanguage;
use crate::render::parse_hex_color;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_API_URL: &str = "http://localhost:8001";
pub const DEFAULT_CANVAS_WIDTH: u32 = 800;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
pub const INK_COLOR: &str = "#1e293b";
pub const DEFAULT_STROKE_THICKNESS: f32 = 2.0;

const MIN_STROKE_THICKNESS: f32 = 1.0;
const MAX_STROKE_THICKNESS: f32 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Timeouts and buffering for one pen connection.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Upper bound for each step of the connect chain.
    pub connect_timeout: Duration,
    pub subscribe_timeout: Duration,
    /// Capacity of the sample channel feeding the canvas.
    pub channel_capacity: usize,
    /// Silence after which the open pen stroke is considered lifted.
    pub pen_lift_gap: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            subscribe_timeout: Duration::from_secs(10),
            channel_capacity: 1024,
            pen_lift_gap: Duration::from_millis(150),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub download_dir: PathBuf,
    pub device: DeviceConfig,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            download_dir: PathBuf::from("."),
            device: DeviceConfig::default(),
        }
    }
}

/// Preferences from the settings page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub auto_save: bool,
    pub ocr_language: OcrLanguage,
    #[serde(alias = "syncToGoogleDrive")]
    pub sync_to_cloud: bool,
    pub stroke_thickness: f32,
    pub canvas_background: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save: true,
            ocr_language: OcrLanguage::default(),
            sync_to_cloud: false,
            stroke_thickness: DEFAULT_STROKE_THICKNESS,
            canvas_background: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file missing, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(settings.sanitized())
    }

    /// Clamps out-of-range values instead of rejecting the whole file.
    pub fn sanitized(mut self) -> Self {
        self.stroke_thickness = sanitize_thickness(self.stroke_thickness);
        if parse_hex_color(&self.canvas_background).is_none() {
            tracing::warn!(
                value = %self.canvas_background,
                "invalid canvas background, falling back to default"
            );
            self.canvas_background = DEFAULT_BACKGROUND.to_string();
        }
        self
    }
}

fn sanitize_thickness(value: f32) -> f32 {
    let value = if value.is_finite() {
        value
    } else {
        DEFAULT_STROKE_THICKNESS
    };
    value.clamp(MIN_STROKE_THICKNESS, MAX_STROKE_THICKNESS)
}
