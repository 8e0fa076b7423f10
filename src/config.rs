// src/config.rs
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::PanelKind;

pub const CONFIG_ENV: &str = "VIRTUAL_LAB_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "virtual_lab.json";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert electrical engineer and lab assistant for \
the virtual instrument bench. Provide technical advice, troubleshooting, and explanations based on the \
current instrument state. Keep responses concise and professional.";
pub const DEFAULT_GREETING: &str = "Hello! I'm your Virtual Lab Assistant. I can help you analyze \
waveforms, suggest instrument configurations, or explain electronic principles. How can I help today?";

/// Start-up settings for the bench application.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LabConfig {
    /// Fixed seed for the spectrum noise floor; entropy when absent.
    pub noise_seed: Option<u64>,
    pub start_running: bool,
    pub initial_panel: PanelKind,
    pub snapshot_dir: PathBuf,
    pub system_instruction: String,
    pub greeting: String,
    pub window_size: [f32; 2],
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            noise_seed: None,
            start_running: true,
            initial_panel: PanelKind::Scope,
            snapshot_dir: PathBuf::from("snapshots"),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_owned(),
            greeting: DEFAULT_GREETING.to_owned(),
            window_size: [1280.0, 860.0],
        }
    }
}

impl LabConfig {
    /// Reads the file named by `VIRTUAL_LAB_CONFIG`, else `virtual_lab.json`.
    /// A missing file yields defaults; a broken one is logged and ignored.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::from_path(&path) {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("ignoring config {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = LabConfig::from_json(r#"{"noise_seed": 42, "initial_panel": "SPECTRUM"}"#).unwrap();
        assert_eq!(config.noise_seed, Some(42));
        assert_eq!(config.initial_panel, PanelKind::Spectrum);
        assert!(config.start_running);
        assert_eq!(config.greeting, DEFAULT_GREETING);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(LabConfig::from_json("{ not json").is_err());
        assert!(LabConfig::from_json(r#"{"initial_panel": "OVEN"}"#).is_err());
    }

    #[test]
    fn reads_from_disk() {
        let path = std::env::temp_dir().join(format!("virtual_lab_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"start_running": false, "window_size": [800, 600]}"#).unwrap();
        let config = LabConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(!config.start_running);
        assert_eq!(config.window_size, [800.0, 600.0]);
        assert!(LabConfig::from_path(&path).is_err());
    }
}
