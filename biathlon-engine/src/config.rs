//! Race configuration types
//!
//! `RaceConfigFile` is the serialized shape as it appears in a config file;
//! `RaceConfig` is the validated, parsed form the engine works with. Loading
//! the file from disk is the host application's job.

use crate::time::{format_duration, format_time_of_day, parse_duration, parse_timestamp};
use crate::types::{Duration, RaceError, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// Race parameters exactly as written in a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceConfigFile {
    /// Number of main laps
    pub laps: i64,
    /// Length of one main lap in meters
    pub lap_len: f64,
    /// Length of one penalty lap in meters
    pub penalty_len: f64,
    /// Number of firing lines per competitor
    pub firing_lines: i64,
    /// Planned start time, `HH:MM:SS.mmm`
    pub start: String,
    /// Allowed lateness of the actual start, `HH:MM:SS[.mmm]`
    pub start_delta: String,
}

/// Validated race parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RaceConfig {
    /// Number of main laps (> 0)
    pub laps: u32,
    /// Length of one main lap in meters (> 0)
    pub lap_len: f64,
    /// Length of one penalty lap in meters (> 0)
    pub penalty_len: f64,
    /// Number of firing lines (> 0)
    pub firing_lines: u32,
    /// Common scheduled start time
    pub start: Timestamp,
    /// Start-time tolerance
    pub start_delta: Duration,
}

impl RaceConfig {
    /// Create a configuration, validating every field
    pub fn new(
        laps: u32,
        lap_len: f64,
        penalty_len: f64,
        firing_lines: u32,
        start: Timestamp,
        start_delta: Duration,
    ) -> Result<Self> {
        let config = Self {
            laps,
            lap_len,
            penalty_len,
            firing_lines,
            start,
            start_delta,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder method: set the number of main laps
    pub fn with_laps(mut self, laps: u32) -> Self {
        self.laps = laps;
        self
    }

    /// Builder method: set the penalty lap length
    pub fn with_penalty_len(mut self, penalty_len: f64) -> Self {
        self.penalty_len = penalty_len;
        self
    }

    /// Builder method: set the number of firing lines
    pub fn with_firing_lines(mut self, firing_lines: u32) -> Self {
        self.firing_lines = firing_lines;
        self
    }

    /// Builder method: set the start-time tolerance
    pub fn with_start_delta(mut self, start_delta: Duration) -> Self {
        self.start_delta = start_delta;
        self
    }

    /// Check the positivity constraints
    pub fn validate(&self) -> Result<()> {
        if self.laps == 0 {
            return Err(RaceError::Config("laps must be > 0".to_string()));
        }
        if !(self.lap_len.is_finite() && self.lap_len > 0.0) {
            return Err(RaceError::Config(format!(
                "lapLen must be > 0 (got {})",
                self.lap_len
            )));
        }
        if !(self.penalty_len.is_finite() && self.penalty_len > 0.0) {
            return Err(RaceError::Config(format!(
                "penaltyLen must be > 0 (got {})",
                self.penalty_len
            )));
        }
        if self.firing_lines == 0 {
            return Err(RaceError::Config("firingLines must be > 0".to_string()));
        }
        if self.start_delta < Duration::zero() {
            return Err(RaceError::Config("startDelta must not be negative".to_string()));
        }
        Ok(())
    }

    /// Whether penalty laps are in play at all
    pub fn penalties_enabled(&self) -> bool {
        self.penalty_len > 0.0
    }

    /// Convert back to the serialized shape
    pub fn to_file(&self) -> RaceConfigFile {
        RaceConfigFile {
            laps: i64::from(self.laps),
            lap_len: self.lap_len,
            penalty_len: self.penalty_len,
            firing_lines: i64::from(self.firing_lines),
            start: format_time_of_day(self.start),
            start_delta: format_duration(self.start_delta),
        }
    }
}

impl TryFrom<RaceConfigFile> for RaceConfig {
    type Error = RaceError;

    fn try_from(file: RaceConfigFile) -> Result<Self> {
        let laps = u32::try_from(file.laps)
            .ok()
            .filter(|laps| *laps > 0)
            .ok_or_else(|| RaceError::Config(format!("laps must be > 0 (got {})", file.laps)))?;
        let firing_lines = u32::try_from(file.firing_lines)
            .ok()
            .filter(|lines| *lines > 0)
            .ok_or_else(|| {
                RaceError::Config(format!("firingLines must be > 0 (got {})", file.firing_lines))
            })?;

        let start = parse_timestamp(&file.start)
            .map_err(|e| RaceError::Config(format!("start: {}", e)))?;
        let start_delta = parse_duration(&file.start_delta)
            .map_err(|e| RaceError::Config(format!("startDelta: {}", e)))?;

        RaceConfig::new(
            laps,
            file.lap_len,
            file.penalty_len,
            firing_lines,
            start,
            start_delta,
        )
    }
}
