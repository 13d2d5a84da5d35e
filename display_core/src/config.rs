use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{DisplayError, DisplayResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Native display name; empty selects the environment default.
    #[serde(default)]
    pub display: String,

    #[serde(default = "default_screen_width")]
    pub screen_width: u32,

    #[serde(default = "default_screen_height")]
    pub screen_height: u32,

    /// `env_logger` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub stats_log: bool,

    #[serde(default = "default_stats_log_period_sec")]
    pub stats_log_period_sec: f32,

    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Negative disables auto-hide, zero hides immediately.
    #[serde(default = "default_cursor_hide_timeout_sec")]
    pub cursor_hide_timeout_sec: f64,
}

fn default_screen_width() -> u32 {
    1920
}
fn default_screen_height() -> u32 {
    1080
}
fn default_log_filter() -> String {
    "info".to_string()
}
fn default_stats_log_period_sec() -> f32 {
    5.0
}
fn default_title() -> String {
    "Display".to_string()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_cursor_hide_timeout_sec() -> f64 {
    -1.0
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            cursor_hide_timeout_sec: default_cursor_hide_timeout_sec(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display: String::new(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            log_filter: default_log_filter(),
            stats_log: false,
            stats_log_period_sec: default_stats_log_period_sec(),
            window: WindowConfig::default(),
        }
    }
}

impl DisplayConfig {
    /// Missing file → defaults. Unparsable file → error.
    pub fn load_or_default(path: &str) -> DisplayResult<Self> {
        match fs::read_to_string(path) {
            Ok(s) => toml::from_str(&s).map_err(|e| DisplayError::Config(format!("parse {}: {}", path, e))),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(s: &str) -> DisplayResult<Self> {
        toml::from_str(s).map_err(|e| DisplayError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let cfg = DisplayConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.screen_width, 1920);
        assert_eq!(cfg.window.width, 640);
        assert_eq!(cfg.window.cursor_hide_timeout_sec, -1.0);
        assert!(!cfg.stats_log);
    }

    #[test]
    fn partial_window_table() {
        let cfg = DisplayConfig::from_toml_str(
            r#"
            display = ":1"
            stats_log = true

            [window]
            title = "Player"
            cursor_hide_timeout_sec = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(cfg.display, ":1");
        assert!(cfg.stats_log);
        assert_eq!(cfg.window.title, "Player");
        assert_eq!(cfg.window.height, 480);
        assert_eq!(cfg.window.cursor_hide_timeout_sec, 2.5);
    }

    #[test]
    fn bad_document_is_config_error() {
        let err = DisplayConfig::from_toml_str("screen_width = \"wide\"").unwrap_err();
        assert!(matches!(err, DisplayError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = DisplayConfig::load_or_default("/nonexistent/display.toml").unwrap();
        assert_eq!(cfg.window.title, "Display");
    }
}
