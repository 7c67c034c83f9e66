//! Non-fatal findings collected while applying events
//!
//! Soft violations never abort a run. They are logged through `log::warn!`
//! and kept here so callers (and tests) can inspect them after the fact.

use crate::time::format_timestamp;
use crate::types::{CompetitorId, Timestamp};
use std::fmt;

/// What kind of surprise was met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Event arrived while the competitor was in an unexpected status
    UnexpectedStatus,
    /// Register for an ID that already exists
    DuplicateRegistration,
    /// Event for a competitor that already reached a final status
    AfterFinalStatus,
    /// Firing line number differs from the next expected one
    FiringLineMismatch,
    /// Firing range entered after all configured lines were completed
    ExtraFiringLine,
    /// Left a firing line that was already counted
    FiringLineAlreadyProcessed,
    /// More hits than shots on one firing line
    ExcessHits,
    /// Penalty laps entered while they are disabled
    PenaltyLapsDisabled,
    /// Penalty laps entered without outstanding misses
    NoOutstandingPenalty,
    /// Penalty laps left without a recorded entry time
    MissingPenaltyStart,
    /// Penalty lap span came out negative and was dropped
    NegativePenaltyDuration,
    /// End of lap before the competitor started
    LapWithoutStart,
    /// Finished without completing every firing line
    IncompleteFiringLines,
    /// Finished or disqualified event found in the raw input
    DerivedEventInInput,
}

/// A single non-fatal finding
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub timestamp: Timestamp,
    pub competitor: CompetitorId,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} competitor {}: {}",
            format_timestamp(self.timestamp),
            self.competitor,
            self.message
        )
    }
}

/// Ordered collection of warnings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and forward it to the logger
    pub fn warn(
        &mut self,
        timestamp: Timestamp,
        competitor: CompetitorId,
        kind: WarningKind,
        message: impl Into<String>,
    ) {
        let warning = Warning {
            timestamp,
            competitor,
            kind,
            message: message.into(),
        };
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Whether any warning of `kind` was recorded
    pub fn contains(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// Warnings about one competitor, in recording order
    pub fn for_competitor(&self, competitor: CompetitorId) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.competitor == competitor)
    }
}
