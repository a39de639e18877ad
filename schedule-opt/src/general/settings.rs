use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

use crate::general::error::ScheduleError;

/// Length of one scheduling interval in minutes.
pub const INTERVAL_MINUTES: i64 = 15;
/// Callers must supply at least one full day of raw data.
pub const MIN_INPUT_INTERVALS: usize = 96;
/// Shortest horizon handed to the solver (two days); keeps runs near month end meaningful.
pub const MIN_HORIZON_INTERVALS: usize = 192;
/// Slack values above this (absolute units) are reported as soft-constraint violations.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-3;

/// Whether the first interval may start at an arbitrary time of day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTimePolicy {
    #[default]
    Flexible,
    RequireMidnight,
}

/// Tunables of the scheduling pipeline, optionally read from `scheduler.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_minutes: i64,
    pub min_input_intervals: usize,
    pub min_horizon_intervals: usize,
    pub feasibility_tolerance: f64,
    pub start_time_policy: StartTimePolicy,
    /// Return only the originally supplied horizon instead of the full normalized window.
    pub trim_to_input: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_minutes: INTERVAL_MINUTES,
            min_input_intervals: MIN_INPUT_INTERVALS,
            min_horizon_intervals: MIN_HORIZON_INTERVALS,
            feasibility_tolerance: FEASIBILITY_TOLERANCE,
            start_time_policy: StartTimePolicy::Flexible,
            trim_to_input: false,
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes)
    }

    /// Load settings from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let raw = fs::read_to_string(path).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: SchedulerSettings =
            toml::from_str(&raw).map_err(|e| ScheduleError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate(path)?;
        Ok(settings)
    }

    /// Like [`SchedulerSettings::load`], but falls back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ScheduleError> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ScheduleError> {
        let problem = if self.interval_minutes <= 0 {
            Some("interval_minutes must be positive")
        } else if self.min_input_intervals == 0 {
            Some("min_input_intervals must be positive")
        } else if self.feasibility_tolerance.is_nan() || self.feasibility_tolerance < 0.0 {
            Some("feasibility_tolerance must be non-negative")
        } else {
            None
        };
        match problem {
            Some(message) => Err(ScheduleError::Config {
                path: path.to_path_buf(),
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }
}
