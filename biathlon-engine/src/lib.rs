//! Biathlon Race Engine Library
//!
//! Reconstructs the state of every competitor in a multi-lap shooting race
//! from an ordered stream of timestamped events, and produces an annotated
//! event log plus a ranked results report.
//!
//! # Architecture
//!
//! - Parses event lines (`[HH:MM:SS.mmm] kind competitor extra...`)
//! - Applies them one by one to a per-competitor state machine
//! - Synthesizes derived events (finish, disqualification)
//! - Collects non-fatal findings as structured diagnostics
//! - Ranks competitors and renders report lines
//!
//! The library does NOT:
//! - Read configuration files
//! - Write output files
//! - Initialise logging
//!
//! All of that lives in the application layer (biathlon-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use biathlon_engine::{run_race, RaceConfig, RaceConfigFile};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let config = RaceConfig::try_from(RaceConfigFile {
//!     laps: 2,
//!     lap_len: 3651.0,
//!     penalty_len: 50.0,
//!     firing_lines: 1,
//!     start: "09:30:00.000".to_string(),
//!     start_delta: "00:00:30".to_string(),
//! })
//! .unwrap();
//!
//! let events = BufReader::new(File::open("events.log").unwrap());
//! let outcome = run_race(config, events).unwrap();
//!
//! for line in outcome.narration() {
//!     println!("{}", line);
//! }
//! for line in outcome.report_lines() {
//!     println!("{}", line);
//! }
//! ```

// Public modules
pub mod competitor;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod event;
pub mod ranking;
pub mod reader;
pub mod time;
pub mod types;

// Re-export main types for convenience
pub use competitor::{Competitor, CompetitorStatus, LapDetail, PenaltySummary};
pub use config::{RaceConfig, RaceConfigFile};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use engine::{run_race, RaceEngine, RaceOutcome};
pub use event::{Event, EventKind};
pub use ranking::{ResultRow, TimedPair};
pub use reader::{EventReader, NumberedEvent};
pub use types::{CompetitorId, Duration, ErrorCategory, RaceError, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
