// config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::camera::CameraCorrector;
use crate::selection::SelectionThresholds;

const APP_NAME: &str = "position_engine";
const CONFIG_FILE_NAME: &str = "config.json";

/// Platform config location, e.g. `~/.config/position_engine/config.json`.
pub fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    });
    dir.push(APP_NAME);
    dir.push(CONFIG_FILE_NAME);
    dir
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum real time between committed clock ticks.
    pub commit_interval_ms: u64,
    /// Alignment magnitude above which the camera is nudged.
    pub camera_threshold_deg: f64,
    pub camera_gain: f64,
    pub selection_angle_epsilon_deg: f64,
    pub selection_altitude_epsilon_km: f64,
    pub selection_velocity_epsilon_km_s: f64,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commit_interval_ms: 1000,
            camera_threshold_deg: 0.05,
            camera_gain: 1.0,
            selection_angle_epsilon_deg: 1e-6,
            selection_altitude_epsilon_km: 1e-3,
            selection_velocity_epsilon_km_s: 1e-6,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the platform config path, or return default if missing
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: EngineConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "commit_interval_ms must be positive".to_string(),
            ));
        }
        let non_negative = [
            ("camera_threshold_deg", self.camera_threshold_deg),
            ("selection_angle_epsilon_deg", self.selection_angle_epsilon_deg),
            ("selection_altitude_epsilon_km", self.selection_altitude_epsilon_km),
            ("selection_velocity_epsilon_km_s", self.selection_velocity_epsilon_km_s),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    pub fn camera_corrector(&self) -> CameraCorrector {
        CameraCorrector::new(self.camera_threshold_deg, self.camera_gain)
    }

    pub fn selection_thresholds(&self) -> SelectionThresholds {
        SelectionThresholds {
            angle_deg: self.selection_angle_epsilon_deg,
            altitude_km: self.selection_altitude_epsilon_km,
            velocity_km_s: self.selection_velocity_epsilon_km_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"commit_interval_ms": 250}"#).unwrap();
        assert_eq!(cfg.commit_interval(), Duration::from_millis(250));
        assert_eq!(cfg.camera_threshold_deg, 0.05);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("position_engine_cfg_{}", std::process::id()))
            .join(CONFIG_FILE_NAME);
        let cfg = EngineConfig {
            camera_gain: 0.5,
            ..EngineConfig::default()
        };
        cfg.save_to(&path).unwrap();
        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let cfg = EngineConfig {
            commit_interval_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
