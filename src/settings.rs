use std::path::PathBuf;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_anchor_weekday")]
    pub anchor_weekday: String,
    #[serde(default = "default_store_ceiling")]
    pub store_ceiling: f64,
}

fn default_anchor_weekday() -> String {
    "thursday".to_string()
}

fn default_store_ceiling() -> f64 {
    100.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            anchor_weekday: default_anchor_weekday(),
            store_ceiling: default_store_ceiling(),
        }
    }
}

impl Settings {
    /// The weekday that starts a reconciliation cycle. An unparseable
    /// setting falls back to the Thursday default with a warning.
    pub fn anchor(&self) -> Weekday {
        self.anchor_weekday.parse().unwrap_or_else(|_| {
            log::warn!(
                "unrecognized anchor_weekday '{}'; using thursday",
                self.anchor_weekday
            );
            Weekday::Thu
        })
    }
}

fn config_dir() -> PathBuf {
    // Overridable so integration tests never touch the real home dir.
    if let Ok(dir) = std::env::var("TRUSTBOOK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("trustbook")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("trustbook")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TrustError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

/// Where the daily store-list files live.
pub fn store_lists_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("store-lists")
}

/// Where the daily quarters feed files live.
pub fn quarters_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("quarters")
}

/// The point-of-sale directory export file.
pub fn pos_export_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("pos-directory.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            anchor_weekday: "monday".to_string(),
            store_ceiling: 75.0,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.anchor_weekday, "monday");
        assert_eq!(loaded.store_ceiling, 75.0);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.anchor_weekday, "thursday");
        assert_eq!(s.store_ceiling, 100.0);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.anchor_weekday, "thursday");
        assert_eq!(s.store_ceiling, 100.0);
    }

    #[test]
    fn test_anchor_parses_weekday_names() {
        let mut s = Settings::default();
        assert_eq!(s.anchor(), Weekday::Thu);
        s.anchor_weekday = "MONDAY".to_string();
        assert_eq!(s.anchor(), Weekday::Mon);
        s.anchor_weekday = "fri".to_string();
        assert_eq!(s.anchor(), Weekday::Fri);
        s.anchor_weekday = "not-a-day".to_string();
        assert_eq!(s.anchor(), Weekday::Thu);
    }
}
