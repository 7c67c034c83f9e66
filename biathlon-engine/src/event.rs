//! Race events
//!
//! An [`Event`] is one line of the input stream (`[timestamp] kind competitor
//! extra...`) or a consequence synthesized by the engine. Its `Display`
//! implementation is the narration sentence written to the output log.

use crate::time::{format_time_of_day, format_timestamp, parse_timestamp};
use crate::types::{CompetitorId, RaceError, Result, Timestamp};
use std::fmt;
use std::str::FromStr;

/// Kind of a race event, keyed by its numeric ID in the input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 1: competitor registered
    Register,
    /// 2: scheduled start time set by draw (extra: `HH:MM:SS.mmm`)
    SetStartTime,
    /// 3: competitor is on the start line
    OnStartLine,
    /// 4: competitor has started
    Started,
    /// 5: competitor is on a firing range (extra: firing line number)
    EnterFiringRange,
    /// 6: target hit (extra: target number)
    HitTarget,
    /// 7: competitor left the firing range
    LeaveFiringRange,
    /// 8: competitor entered the penalty laps
    EnterPenaltyLaps,
    /// 9: competitor left the penalty laps
    LeavePenaltyLaps,
    /// 10: competitor ended a main lap
    EndLap,
    /// 11: competitor can't continue (extra: free-text comment)
    CannotContinue,
    /// 32: competitor is disqualified (derived)
    Disqualified,
    /// 33: competitor has finished (derived)
    Finished,
    /// Any other ID
    Unknown(u32),
}

impl EventKind {
    /// Map a numeric event ID to its kind
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => EventKind::Register,
            2 => EventKind::SetStartTime,
            3 => EventKind::OnStartLine,
            4 => EventKind::Started,
            5 => EventKind::EnterFiringRange,
            6 => EventKind::HitTarget,
            7 => EventKind::LeaveFiringRange,
            8 => EventKind::EnterPenaltyLaps,
            9 => EventKind::LeavePenaltyLaps,
            10 => EventKind::EndLap,
            11 => EventKind::CannotContinue,
            32 => EventKind::Disqualified,
            33 => EventKind::Finished,
            other => EventKind::Unknown(other),
        }
    }

    /// Numeric event ID as used in the input stream
    pub fn id(&self) -> u32 {
        match self {
            EventKind::Register => 1,
            EventKind::SetStartTime => 2,
            EventKind::OnStartLine => 3,
            EventKind::Started => 4,
            EventKind::EnterFiringRange => 5,
            EventKind::HitTarget => 6,
            EventKind::LeaveFiringRange => 7,
            EventKind::EnterPenaltyLaps => 8,
            EventKind::LeavePenaltyLaps => 9,
            EventKind::EndLap => 10,
            EventKind::CannotContinue => 11,
            EventKind::Disqualified => 32,
            EventKind::Finished => 33,
            EventKind::Unknown(id) => *id,
        }
    }

    /// True for events that originate from participants or judges (IDs 1..=11)
    pub fn is_incoming(&self) -> bool {
        (1..=11).contains(&self.id())
    }

    /// True for events only the engine is supposed to produce
    pub fn is_derived(&self) -> bool {
        matches!(self, EventKind::Disqualified | EventKind::Finished)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A single race event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    timestamp: Timestamp,
    kind: EventKind,
    competitor: CompetitorId,
    extra: Vec<String>,
    incoming: bool,
}

impl Event {
    /// Create an event as it would appear in the input stream
    pub fn new(
        timestamp: Timestamp,
        kind: EventKind,
        competitor: CompetitorId,
        extra: Vec<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            competitor,
            extra,
            incoming: kind.is_incoming(),
        }
    }

    /// Create an engine-synthesized event
    pub fn derived(
        timestamp: Timestamp,
        kind: EventKind,
        competitor: CompetitorId,
        extra: Vec<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            competitor,
            extra,
            incoming: false,
        }
    }

    /// Parse one line of the event stream
    pub fn parse(line: &str) -> Result<Self> {
        let malformed = |reason: String| RaceError::MalformedEvent {
            line: line.to_string(),
            reason,
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(malformed(format!(
                "expected at least 3 fields, found {}",
                parts.len()
            )));
        }

        let timestamp =
            parse_timestamp(parts[0]).map_err(|e| malformed(format!("invalid timestamp: {}", e)))?;
        let kind_id: u32 = parts[1]
            .parse()
            .map_err(|e| malformed(format!("invalid event ID '{}': {}", parts[1], e)))?;
        let competitor: CompetitorId = parts[2]
            .parse()
            .map_err(|e| malformed(format!("invalid competitor ID '{}': {}", parts[2], e)))?;

        let extra = parts[3..].iter().map(|s| s.to_string()).collect();

        Ok(Self::new(timestamp, EventKind::from_id(kind_id), competitor, extra))
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn competitor(&self) -> CompetitorId {
        self.competitor
    }

    /// Free-form parameters following the competitor ID
    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    /// First extra parameter, if any
    pub fn first_extra(&self) -> Option<&str> {
        self.extra.first().map(String::as_str)
    }

    /// Extra parameters joined with single spaces (empty if none)
    pub fn extra_text(&self) -> String {
        self.extra.join(" ")
    }

    /// Whether this event came from the input stream with an incoming ID
    pub fn is_incoming(&self) -> bool {
        self.incoming
    }

    /// Narration sentence for the output log
    pub fn narration(&self) -> String {
        self.to_string()
    }

    fn details(&self) -> String {
        let competitor = format!("competitor({})", self.competitor);

        match self.kind {
            EventKind::Register => format!("The {} registered", competitor),
            EventKind::SetStartTime => {
                let start = match self.first_extra() {
                    Some(raw) => match parse_timestamp(raw) {
                        Ok(parsed) => format_time_of_day(parsed),
                        Err(e) => {
                            log::warn!("Unable to parse start time '{}' for output: {}", raw, e);
                            raw.to_string()
                        }
                    },
                    None => "N/A".to_string(),
                };
                format!(
                    "The start time for the {} was set by a draw to {}",
                    competitor, start
                )
            }
            EventKind::OnStartLine => format!("The {} is on the start line", competitor),
            EventKind::Started => format!("The {} has started", competitor),
            EventKind::EnterFiringRange => format!(
                "The {} is on the firing range({})",
                competitor,
                self.first_extra().unwrap_or("?")
            ),
            EventKind::HitTarget => format!(
                "The target({}) has been hit by {}",
                self.first_extra().unwrap_or("?"),
                competitor
            ),
            EventKind::LeaveFiringRange => format!("The {} left the firing range", competitor),
            EventKind::EnterPenaltyLaps => format!("The {} entered the penalty laps", competitor),
            EventKind::LeavePenaltyLaps => format!("The {} left the penalty laps", competitor),
            EventKind::EndLap => format!("The {} ended the main lap", competitor),
            EventKind::CannotContinue => {
                if self.extra.is_empty() {
                    format!("The {} can`t continue", competitor)
                } else {
                    format!("The {} can`t continue: {}", competitor, self.extra_text())
                }
            }
            EventKind::Disqualified => {
                let reason = if self.extra.is_empty() {
                    "Reason not specified".to_string()
                } else {
                    self.extra_text()
                };
                format!("The {} is disqualified ({})", competitor, reason)
            }
            EventKind::Finished => format!("The {} has finished", competitor),
            EventKind::Unknown(id) => format!("Unknown event ID({}) for {}", id, competitor),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_timestamp(self.timestamp), self.details())
    }
}

impl FromStr for Event {
    type Err = RaceError;

    fn from_str(line: &str) -> Result<Self> {
        Event::parse(line)
    }
}
