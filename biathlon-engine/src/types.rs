//! Core types for the biathlon race engine
//!
//! This module defines the identifiers, time aliases and the error type shared
//! by every stage of the pipeline (parsing, state machine, ranking).

use chrono::{NaiveTime, TimeDelta};
use std::fmt;

/// Time of day at which an event happened (millisecond precision)
pub type Timestamp = NaiveTime;

/// Signed span between two timestamps
pub type Duration = TimeDelta;

/// Competitor identifier as it appears in the event stream
pub type CompetitorId = u32;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, RaceError>;

/// Coarse classification of fatal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing configuration values
    Config,
    /// Malformed event line or un-parseable time/number
    Parse,
    /// Timestamp regression between consecutive events
    Ordering,
    /// Event inconsistent with the race (unknown competitor, bad firing line)
    Semantic,
    /// Reading the input failed
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "ConfigError"),
            ErrorCategory::Parse => write!(f, "ParseError"),
            ErrorCategory::Ordering => write!(f, "OrderingError"),
            ErrorCategory::Semantic => write!(f, "SemanticError"),
            ErrorCategory::Io => write!(f, "IoError"),
        }
    }
}

/// Fatal errors that abort a race run
///
/// Anything recoverable is reported through [`crate::Diagnostics`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed event '{line}': {reason}")]
    MalformedEvent { line: String, reason: String },

    #[error("Failed to parse time '{value}': {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("Failed to parse duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Time order of events is broken: {current} before {previous}")]
    Ordering { previous: String, current: String },

    #[error("Event {kind} for unregistered competitor {competitor}")]
    UnregisteredCompetitor { competitor: CompetitorId, kind: u32 },

    #[error("Missing {what} in event {kind} for competitor {competitor}")]
    MissingParameter {
        competitor: CompetitorId,
        kind: u32,
        what: &'static str,
    },

    #[error("Invalid {what} '{value}' in event {kind} for competitor {competitor}")]
    InvalidParameter {
        competitor: CompetitorId,
        kind: u32,
        what: &'static str,
        value: String,
    },

    #[error("Invalid firing line {line} for competitor {competitor} (configured: {configured})")]
    FiringLineOutOfRange {
        competitor: CompetitorId,
        line: i64,
        configured: u32,
    },

    #[error("Unknown event ID {kind} for competitor {competitor}")]
    UnknownEventKind { competitor: CompetitorId, kind: u32 },

    #[error("Line {line_no} ('{line}'): {source}")]
    AtLine {
        line_no: usize,
        line: String,
        #[source]
        source: Box<RaceError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RaceError {
    /// Attach the input line that caused this error
    pub fn at_line(self, line_no: usize, line: impl Into<String>) -> Self {
        RaceError::AtLine {
            line_no,
            line: line.into(),
            source: Box::new(self),
        }
    }

    /// Category of the underlying failure (line context is looked through)
    pub fn category(&self) -> ErrorCategory {
        match self {
            RaceError::Config(_) => ErrorCategory::Config,
            RaceError::MalformedEvent { .. }
            | RaceError::InvalidTime { .. }
            | RaceError::InvalidDuration { .. }
            | RaceError::InvalidParameter { .. } => ErrorCategory::Parse,
            RaceError::Ordering { .. } => ErrorCategory::Ordering,
            RaceError::UnregisteredCompetitor { .. }
            | RaceError::MissingParameter { .. }
            | RaceError::FiringLineOutOfRange { .. }
            | RaceError::UnknownEventKind { .. } => ErrorCategory::Semantic,
            RaceError::AtLine { source, .. } => source.category(),
            RaceError::Io(_) => ErrorCategory::Io,
        }
    }

    /// The error without any line context
    pub fn root(&self) -> &RaceError {
        match self {
            RaceError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    /// Line number attached to this error, if any
    pub fn line_no(&self) -> Option<usize> {
        match self {
            RaceError::AtLine { line_no, .. } => Some(*line_no),
            _ => None,
        }
    }
}
