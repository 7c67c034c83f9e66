//! Per-competitor race state
//!
//! A [`Competitor`] is created by a Register event and afterwards mutated only
//! by the [`crate::RaceEngine`]. The derived values used by the report (total
//! time, final status label) are computed here.

use crate::time::format_duration;
use crate::types::{CompetitorId, Duration, Timestamp};
use serde::Serialize;
use std::fmt;

/// Shots fired on every firing line
pub const SHOTS_PER_FIRING_LINE: u32 = 5;

/// Reason that turns a disqualification into a NotStarted status
pub const NOT_STARTED_REASON: &str = "NotStarted";

/// Where a competitor is in the race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompetitorStatus {
    Registered,
    ReadyToStart,
    Started,
    Firing,
    Penalized,
    Finished,
    NotFinished,
    NotStarted,
    Disqualified,
}

impl CompetitorStatus {
    /// Terminal statuses are reached exactly once and never left
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompetitorStatus::Finished
                | CompetitorStatus::NotFinished
                | CompetitorStatus::NotStarted
                | CompetitorStatus::Disqualified
        )
    }

    /// Ordering rank among competitors that did not finish (lower is better)
    pub fn severity_rank(&self) -> u8 {
        match self {
            CompetitorStatus::NotFinished => 1,
            CompetitorStatus::NotStarted => 2,
            CompetitorStatus::Disqualified => 3,
            _ => 4,
        }
    }
}

impl fmt::Display for CompetitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompetitorStatus::Registered => "Registered",
            CompetitorStatus::ReadyToStart => "ReadyToStart",
            CompetitorStatus::Started => "Started",
            CompetitorStatus::Firing => "Firing",
            CompetitorStatus::Penalized => "Penalized",
            CompetitorStatus::Finished => "Finished",
            CompetitorStatus::NotFinished => "NotFinished",
            CompetitorStatus::NotStarted => "NotStarted",
            CompetitorStatus::Disqualified => "Disqualified",
        };
        write!(f, "{}", name)
    }
}

/// One completed main lap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapDetail {
    pub duration: Duration,
    /// Average speed in m/s
    pub speed: f64,
}

/// Summary of all penalty laps served
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltySummary {
    pub total_duration: Duration,
    /// Average speed over all penalty laps in m/s
    pub average_speed: f64,
}

impl Default for PenaltySummary {
    fn default() -> Self {
        Self {
            total_duration: Duration::zero(),
            average_speed: 0.0,
        }
    }
}

/// Full state of one competitor
#[derive(Debug, Clone, PartialEq)]
pub struct Competitor {
    pub id: CompetitorId,
    pub status: CompetitorStatus,
    /// Start time assigned by draw
    pub scheduled_start: Option<Timestamp>,
    /// Time of the accepted Started event
    pub actual_start: Option<Timestamp>,
    /// Time of finish, non-finish or disqualification
    pub finish_time: Option<Timestamp>,
    pub last_event_time: Timestamp,

    /// 1-based index of the lap being run (0 before the start)
    pub current_lap: u32,
    pub current_lap_start: Option<Timestamp>,
    /// Indexed by lap number - 1; laps not completed yet are `None`
    pub laps: Vec<Option<LapDetail>>,

    // Shooting
    pub hits_this_range: u32,
    /// Firing line entered and not yet left (0 = none)
    pub last_firing_line_entered: u32,
    pub firing_lines_completed: u32,
    pub total_hits: u32,
    pub total_shots: u32,

    // Penalties
    /// Misses that still have to be paid with penalty laps
    pub misses_to_penalize: u32,
    pub penalty_start: Option<Timestamp>,
    pub total_penalty_time: Duration,
    pub total_penalty_laps: u32,
    /// Finalized when the competitor finishes or cannot continue
    pub penalty_summary: Option<PenaltySummary>,

    /// Disqualification or non-finish reason
    pub reason: Option<String>,
}

impl Competitor {
    /// Create a freshly registered competitor
    pub fn new(id: CompetitorId, registered_at: Timestamp) -> Self {
        Self {
            id,
            status: CompetitorStatus::Registered,
            scheduled_start: None,
            actual_start: None,
            finish_time: None,
            last_event_time: registered_at,
            current_lap: 0,
            current_lap_start: None,
            laps: Vec::new(),
            hits_this_range: 0,
            last_firing_line_entered: 0,
            firing_lines_completed: 0,
            total_hits: 0,
            total_shots: 0,
            misses_to_penalize: 0,
            penalty_start: None,
            total_penalty_time: Duration::zero(),
            total_penalty_laps: 0,
            penalty_summary: None,
            reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Details of a completed lap (1-based)
    pub fn lap(&self, lap: u32) -> Option<&LapDetail> {
        let index = usize::try_from(lap.checked_sub(1)?).ok()?;
        self.laps.get(index)?.as_ref()
    }

    /// Store the result of a lap (1-based), growing the sparse list as needed
    pub fn record_lap(&mut self, lap: u32, detail: LapDetail) {
        let Some(index) = lap.checked_sub(1).map(|i| i as usize) else {
            return;
        };
        if self.laps.len() <= index {
            self.laps.resize(index + 1, None);
        }
        self.laps[index] = Some(detail);
    }

    /// Compute the penalty summary from the accumulated penalty laps
    ///
    /// Returns `None` when no penalty laps were served or they are disabled.
    pub fn summarize_penalties(&self, penalty_len: f64) -> Option<PenaltySummary> {
        if self.total_penalty_laps == 0 || penalty_len <= 0.0 {
            return None;
        }
        let distance = f64::from(self.total_penalty_laps) * penalty_len;
        Some(PenaltySummary {
            total_duration: self.total_penalty_time,
            average_speed: crate::time::calculate_speed(distance, self.total_penalty_time),
        })
    }

    /// Total race time: finish minus actual start, plus any late start
    ///
    /// Only defined for finished competitors. Without a scheduled start the
    /// late-start component is zero.
    pub fn total_time(&self) -> Option<Duration> {
        if self.status != CompetitorStatus::Finished {
            return None;
        }
        let actual_start = self.actual_start?;
        let finish = self.finish_time?;

        let late_start = self
            .scheduled_start
            .map(|scheduled| actual_start.signed_duration_since(scheduled))
            .filter(|diff| *diff > Duration::zero())
            .unwrap_or_else(Duration::zero);

        Some(finish.signed_duration_since(actual_start) + late_start)
    }

    /// First column of the report line
    pub fn final_status_label(&self) -> String {
        match self.status {
            CompetitorStatus::Finished => match self.total_time() {
                Some(total) => format_duration(total),
                None => "[Error Calculating Time]".to_string(),
            },
            CompetitorStatus::NotFinished => "[NotFinished]".to_string(),
            CompetitorStatus::NotStarted => "[NotStarted]".to_string(),
            CompetitorStatus::Disqualified => match self.reason.as_deref() {
                Some(reason) if !reason.is_empty() => format!("[Disqualified: {}]", reason),
                _ => "[Disqualified]".to_string(),
            },
            _ => "[In Progress]".to_string(),
        }
    }
}
