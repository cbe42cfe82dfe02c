// sim_config.rs

use chrono::{DateTime, Utc};
use position_engine::ConfigError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// About two simulated years per real minute.
const MAX_TIME_MULTIPLIER: f64 = 1.0e6;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Real time between renderer frames.
    pub frame_interval_ms: u64,
    /// Simulated seconds per real second.
    pub time_multiplier: f64,
    /// Stop after this much real time. Zero runs until interrupted.
    pub run_seconds: u64,
    pub summary_interval_secs: u64,
    /// Re-read the catalog file this often. Zero disables reloading.
    pub reload_interval_secs: u64,
    /// Simulated start time. Defaults to the wall clock at startup.
    pub start_time: Option<DateTime<Utc>>,
    /// Catalog number to select once the catalog is loaded.
    pub follow: Option<u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            time_multiplier: 1.0,
            run_seconds: 60,
            summary_interval_secs: 30,
            reload_interval_secs: 0,
            start_time: None,
            follow: Some(25544),
        }
    }
}

impl SimConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: SimConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_interval_ms must be positive".to_string(),
            ));
        }
        if !(self.time_multiplier.is_finite() && self.time_multiplier.abs() <= MAX_TIME_MULTIPLIER)
        {
            return Err(ConfigError::Invalid(format!(
                "time_multiplier must be within +/-{MAX_TIME_MULTIPLIER}, got {}",
                self.time_multiplier
            )));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn run_duration(&self) -> Option<Duration> {
        (self.run_seconds > 0).then(|| Duration::from_secs(self.run_seconds))
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs.max(1))
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }

    /// Simulated time after `elapsed` real time, running backward for a
    /// negative multiplier. `None` once the result leaves chrono's range.
    pub fn sim_time(&self, start: DateTime<Utc>, elapsed: Duration) -> Option<DateTime<Utc>> {
        let millis = elapsed.as_secs_f64() * 1000.0 * self.time_multiplier;
        if !millis.is_finite() {
            return None;
        }
        let offset = chrono::TimeDelta::try_milliseconds(millis.round() as i64)?;
        start.checked_add_signed(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg: SimConfig =
            serde_json::from_str(r#"{"time_multiplier": 60.0, "follow": null}"#).unwrap();
        assert_eq!(cfg.frame_interval(), Duration::from_millis(100));
        assert_eq!(cfg.time_multiplier, 60.0);
        assert_eq!(cfg.follow, None);
        assert!(cfg.reload_interval().is_none());
    }

    #[test]
    fn test_sim_time_scales_elapsed() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let cfg = SimConfig {
            time_multiplier: 60.0,
            ..SimConfig::default()
        };
        assert_eq!(
            cfg.sim_time(start, Duration::from_millis(1500)),
            Some(start + chrono::Duration::seconds(90))
        );

        let rewind = SimConfig {
            time_multiplier: -2.0,
            ..SimConfig::default()
        };
        assert_eq!(
            rewind.sim_time(start, Duration::from_secs(10)),
            Some(start - chrono::Duration::seconds(20))
        );
    }

    #[test]
    fn test_sim_time_out_of_range_is_none() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let cfg = SimConfig {
            time_multiplier: MAX_TIME_MULTIPLIER,
            ..SimConfig::default()
        };
        // About 3e14 simulated seconds, far past the last representable year
        assert_eq!(cfg.sim_time(start, Duration::from_secs(300_000_000)), None);

        let runaway = SimConfig {
            time_multiplier: 1.0e12,
            ..SimConfig::default()
        };
        assert!(matches!(runaway.validate(), Err(ConfigError::Invalid(_))));
        let runaway = SimConfig {
            time_multiplier: -1.0e12,
            ..SimConfig::default()
        };
        assert!(runaway.validate().is_err());
    }

    #[test]
    fn test_validate() {
        let cfg = SimConfig {
            frame_interval_ms: 0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = SimConfig {
            run_seconds: 0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert!(cfg.run_duration().is_none());
    }
}
