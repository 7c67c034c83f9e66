//! Race engine
//!
//! The engine owns every competitor and applies events to them one at a
//! time, in non-decreasing timestamp order. Each event is narrated (if it is
//! incoming), validated against the competitor's current status and turned
//! into a state transition. Finishing and disqualification are synthesized
//! here as derived events.
//!
//! Fatal problems are returned as [`RaceError`]; anything recoverable is
//! recorded in [`Diagnostics`] and processing continues.

use crate::competitor::{
    Competitor, CompetitorStatus, LapDetail, NOT_STARTED_REASON, SHOTS_PER_FIRING_LINE,
};
use crate::config::RaceConfig;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::event::{Event, EventKind};
use crate::ranking;
use crate::reader::{EventReader, NumberedEvent};
use crate::time::{add_duration, calculate_speed, format_duration, format_timestamp, parse_timestamp};
use crate::types::{CompetitorId, Duration, RaceError, Result, Timestamp};
use std::collections::BTreeMap;
use std::io::BufRead;

/// Reason recorded when a competitor enters more firing ranges than configured
pub const EXTRA_FIRING_LINE_REASON: &str = "Extra firing line";

/// Reason recorded when a non-finish or disqualification carries no comment
pub const UNSPECIFIED_REASON: &str = "Reason not specified";

/// Event-driven race state machine
pub struct RaceEngine {
    config: RaceConfig,
    /// Competitors by ID; never removed once registered
    competitors: BTreeMap<CompetitorId, Competitor>,
    /// Every applied event plus the derived ones, in application order
    history: Vec<Event>,
    /// Output log lines
    narration: Vec<String>,
    diagnostics: Diagnostics,
    /// Timestamp of the latest applied event
    current_time: Option<Timestamp>,
}

impl RaceEngine {
    pub fn new(config: RaceConfig) -> Self {
        Self {
            config,
            competitors: BTreeMap::new(),
            history: Vec::new(),
            narration: Vec::new(),
            diagnostics: Diagnostics::new(),
            current_time: None,
        }
    }

    /// Apply one event
    ///
    /// Events must arrive in non-decreasing timestamp order; a regression is
    /// an ordering error and nothing is changed.
    pub fn apply(&mut self, event: Event) -> Result<()> {
        let now = event.timestamp();
        if let Some(previous) = self.current_time {
            if now < previous {
                return Err(RaceError::Ordering {
                    previous: format_timestamp(previous),
                    current: format_timestamp(now),
                });
            }
        }
        self.current_time = Some(now);

        log::debug!(
            "Applying event {} for competitor {} at {}",
            event.kind(),
            event.competitor(),
            format_timestamp(now)
        );

        if event.is_incoming() {
            self.narration.push(event.narration());
        }

        // Derived kinds found in the input are re-synthesized by the engine,
        // so they are not kept in the history themselves.
        if !event.kind().is_derived() {
            self.history.push(event.clone());
        }

        if event.kind() == EventKind::Register {
            self.register(&event);
            return Ok(());
        }

        let id = event.competitor();
        self.with_competitor(id, |engine, competitor| engine.transition(competitor, &event))
            .unwrap_or_else(|| {
                Err(RaceError::UnregisteredCompetitor {
                    competitor: id,
                    kind: event.kind().id(),
                })
            })
    }

    /// Disqualify competitors who never started within their start window
    ///
    /// Runs once after the whole stream was applied. The deadline is compared
    /// with the last timestamp seen; competitors without a scheduled start are
    /// left untouched.
    pub fn check_for_not_started(&mut self) {
        let Some(now) = self.current_time else {
            return;
        };

        let candidates: Vec<CompetitorId> = self
            .competitors
            .values()
            .filter(|c| {
                matches!(
                    c.status,
                    CompetitorStatus::Registered | CompetitorStatus::ReadyToStart
                ) && c.actual_start.is_none()
                    && c.scheduled_start.is_some()
            })
            .map(|c| c.id)
            .collect();

        for id in candidates {
            self.with_competitor(id, |engine, competitor| {
                if let Some(scheduled) = competitor.scheduled_start {
                    let deadline = add_duration(scheduled, engine.config.start_delta);
                    if now > deadline {
                        log::info!(
                            "Competitor {} did not start by {} (deadline {}), status NotStarted",
                            competitor.id,
                            format_timestamp(now),
                            format_timestamp(deadline)
                        );
                        engine.disqualify(competitor, deadline, NOT_STARTED_REASON);
                    }
                }
            });
        }
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn competitor(&self, id: CompetitorId) -> Option<&Competitor> {
        self.competitors.get(&id)
    }

    /// All competitors in ascending ID order
    pub fn competitors(&self) -> impl Iterator<Item = &Competitor> {
        self.competitors.values()
    }

    pub fn narration(&self) -> &[String] {
        &self.narration
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Timestamp of the latest applied event
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.current_time
    }

    /// Stop processing and hand the final state to the report stage
    pub fn into_outcome(self) -> RaceOutcome {
        RaceOutcome {
            config: self.config,
            competitors: self.competitors,
            history: self.history,
            narration: self.narration,
            diagnostics: self.diagnostics,
        }
    }

    /// Run `f` on a competitor taken out of the arena, then put it back
    ///
    /// `None` if no competitor with `id` is registered.
    fn with_competitor<T>(
        &mut self,
        id: CompetitorId,
        f: impl FnOnce(&mut Self, &mut Competitor) -> T,
    ) -> Option<T> {
        let mut competitor = self.competitors.remove(&id)?;
        let result = f(self, &mut competitor);
        self.competitors.insert(id, competitor);
        Some(result)
    }

    fn register(&mut self, event: &Event) {
        let id = event.competitor();
        if self.competitors.contains_key(&id) {
            self.diagnostics.warn(
                event.timestamp(),
                id,
                WarningKind::DuplicateRegistration,
                format!("re-registered at {}", format_timestamp(event.timestamp())),
            );
        } else {
            self.competitors.insert(id, Competitor::new(id, event.timestamp()));
        }
    }

    fn transition(&mut self, competitor: &mut Competitor, event: &Event) -> Result<()> {
        let now = event.timestamp();

        if event.kind() != EventKind::SetStartTime {
            competitor.last_event_time = now;
        }

        if competitor.is_terminal() {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::AfterFinalStatus,
                format!(
                    "event {} ignored, competitor is already {}",
                    event.kind(),
                    competitor.status
                ),
            );
            return Ok(());
        }

        match event.kind() {
            EventKind::Register => Ok(()),
            EventKind::SetStartTime => self.on_set_start_time(competitor, event),
            EventKind::OnStartLine => {
                self.on_start_line(competitor, now);
                Ok(())
            }
            EventKind::Started => {
                self.on_started(competitor, now);
                Ok(())
            }
            EventKind::EnterFiringRange => self.on_enter_firing_range(competitor, event),
            EventKind::HitTarget => {
                self.on_hit_target(competitor, now);
                Ok(())
            }
            EventKind::LeaveFiringRange => {
                self.on_leave_firing_range(competitor, now);
                Ok(())
            }
            EventKind::EnterPenaltyLaps => {
                self.on_enter_penalty_laps(competitor, now);
                Ok(())
            }
            EventKind::LeavePenaltyLaps => {
                self.on_leave_penalty_laps(competitor, now);
                Ok(())
            }
            EventKind::EndLap => {
                self.on_end_lap(competitor, now);
                Ok(())
            }
            EventKind::CannotContinue => {
                self.on_cannot_continue(competitor, event);
                Ok(())
            }
            EventKind::Disqualified => {
                self.diagnostics.warn(
                    now,
                    competitor.id,
                    WarningKind::DerivedEventInInput,
                    "disqualification found in the input stream",
                );
                let reason = non_empty_or_default(event.extra_text());
                self.disqualify(competitor, now, &reason);
                Ok(())
            }
            EventKind::Finished => {
                self.diagnostics.warn(
                    now,
                    competitor.id,
                    WarningKind::DerivedEventInInput,
                    "finish found in the input stream",
                );
                self.finish(competitor, now);
                Ok(())
            }
            EventKind::Unknown(kind) => Err(RaceError::UnknownEventKind {
                competitor: competitor.id,
                kind,
            }),
        }
    }

    fn on_set_start_time(&mut self, competitor: &mut Competitor, event: &Event) -> Result<()> {
        let raw = event.first_extra().ok_or(RaceError::MissingParameter {
            competitor: competitor.id,
            kind: event.kind().id(),
            what: "start time",
        })?;
        let scheduled = parse_timestamp(raw).map_err(|_| RaceError::InvalidParameter {
            competitor: competitor.id,
            kind: event.kind().id(),
            what: "start time",
            value: raw.to_string(),
        })?;
        competitor.scheduled_start = Some(scheduled);
        Ok(())
    }

    fn on_start_line(&mut self, competitor: &mut Competitor, now: Timestamp) {
        match competitor.status {
            CompetitorStatus::Registered | CompetitorStatus::ReadyToStart => {
                competitor.status = CompetitorStatus::ReadyToStart;
            }
            other => self.unexpected_status(competitor.id, now, EventKind::OnStartLine, other, "Registered or ReadyToStart"),
        }
    }

    fn on_started(&mut self, competitor: &mut Competitor, now: Timestamp) {
        if !matches!(
            competitor.status,
            CompetitorStatus::ReadyToStart | CompetitorStatus::Registered
        ) {
            self.unexpected_status(
                competitor.id,
                now,
                EventKind::Started,
                competitor.status,
                "ReadyToStart or Registered",
            );
        }

        if let Some(scheduled) = competitor.scheduled_start {
            let deadline = add_duration(scheduled, self.config.start_delta);
            if now > deadline {
                self.disqualify(competitor, now, NOT_STARTED_REASON);
                return;
            }
        }

        competitor.status = CompetitorStatus::Started;
        competitor.actual_start = Some(now);
        competitor.current_lap = 1;
        competitor.current_lap_start = Some(now);
    }

    fn on_enter_firing_range(&mut self, competitor: &mut Competitor, event: &Event) -> Result<()> {
        let now = event.timestamp();
        let configured = self.config.firing_lines;

        if competitor.firing_lines_completed >= configured {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::ExtraFiringLine,
                format!(
                    "attempts to enter a firing line after completing all {} required lines",
                    configured
                ),
            );
            self.disqualify(competitor, now, EXTRA_FIRING_LINE_REASON);
            return Ok(());
        }

        let raw = event.first_extra().ok_or(RaceError::MissingParameter {
            competitor: competitor.id,
            kind: event.kind().id(),
            what: "firing line number",
        })?;
        let line: i64 = raw.parse().map_err(|_| RaceError::InvalidParameter {
            competitor: competitor.id,
            kind: event.kind().id(),
            what: "firing line number",
            value: raw.to_string(),
        })?;

        let expected = competitor.firing_lines_completed + 1;
        if line != i64::from(expected) {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::FiringLineMismatch,
                format!(
                    "reached firing line {} although {} was expected (completed: {})",
                    line, expected, competitor.firing_lines_completed
                ),
            );
        }
        let line = u32::try_from(line)
            .ok()
            .filter(|l| (1..=configured).contains(l))
            .ok_or(RaceError::FiringLineOutOfRange {
                competitor: competitor.id,
                line,
                configured,
            })?;

        if !matches!(
            competitor.status,
            CompetitorStatus::Started | CompetitorStatus::Penalized
        ) {
            self.unexpected_status(
                competitor.id,
                now,
                EventKind::EnterFiringRange,
                competitor.status,
                "Started or Penalized",
            );
        }

        competitor.status = CompetitorStatus::Firing;
        competitor.hits_this_range = 0;
        competitor.last_firing_line_entered = line;
        Ok(())
    }

    fn on_hit_target(&mut self, competitor: &mut Competitor, now: Timestamp) {
        if competitor.status == CompetitorStatus::Firing {
            competitor.hits_this_range += 1;
            competitor.total_hits += 1;
        } else {
            self.unexpected_status(competitor.id, now, EventKind::HitTarget, competitor.status, "Firing");
        }
    }

    fn on_leave_firing_range(&mut self, competitor: &mut Competitor, now: Timestamp) {
        if competitor.status != CompetitorStatus::Firing {
            self.unexpected_status(
                competitor.id,
                now,
                EventKind::LeaveFiringRange,
                competitor.status,
                "Firing",
            );
            competitor.last_firing_line_entered = 0;
            return;
        }

        let line = competitor.last_firing_line_entered;
        let mut shots = 0;
        if line > 0 && line > competitor.firing_lines_completed {
            shots = SHOTS_PER_FIRING_LINE;
            competitor.total_shots += shots;
            competitor.firing_lines_completed += 1;
        } else if line > 0 {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::FiringLineAlreadyProcessed,
                format!(
                    "left firing line {} which was already processed (completed: {})",
                    line, competitor.firing_lines_completed
                ),
            );
        }

        let misses = match shots.checked_sub(competitor.hits_this_range) {
            Some(misses) => misses,
            None => {
                self.diagnostics.warn(
                    now,
                    competitor.id,
                    WarningKind::ExcessHits,
                    format!(
                        "recorded {} hits with {} shots on firing line {}",
                        competitor.hits_this_range, shots, line
                    ),
                );
                0
            }
        };
        competitor.misses_to_penalize += misses;

        if competitor.misses_to_penalize == 0 {
            competitor.status = CompetitorStatus::Started;
        }

        competitor.hits_this_range = 0;
        competitor.last_firing_line_entered = 0;
    }

    fn on_enter_penalty_laps(&mut self, competitor: &mut Competitor, now: Timestamp) {
        if !matches!(
            competitor.status,
            CompetitorStatus::Firing | CompetitorStatus::Started | CompetitorStatus::Penalized
        ) {
            self.unexpected_status(
                competitor.id,
                now,
                EventKind::EnterPenaltyLaps,
                competitor.status,
                "Firing, Started or Penalized",
            );
        }

        if !self.config.penalties_enabled() {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::PenaltyLapsDisabled,
                "entered the penalty laps, but their length is 0",
            );
            competitor.status = CompetitorStatus::Started;
            return;
        }
        if competitor.misses_to_penalize == 0 {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::NoOutstandingPenalty,
                "entered the penalty laps without any outstanding misses",
            );
            competitor.status = CompetitorStatus::Started;
            return;
        }

        competitor.status = CompetitorStatus::Penalized;
        competitor.penalty_start = Some(now);
    }

    fn on_leave_penalty_laps(&mut self, competitor: &mut Competitor, now: Timestamp) {
        if competitor.status != CompetitorStatus::Penalized {
            self.unexpected_status(
                competitor.id,
                now,
                EventKind::LeavePenaltyLaps,
                competitor.status,
                "Penalized",
            );
            if competitor.penalty_start.is_none() {
                self.diagnostics.warn(
                    now,
                    competitor.id,
                    WarningKind::MissingPenaltyStart,
                    "no penalty lap entry time, event ignored",
                );
                return;
            }
        }

        match competitor.penalty_start.take() {
            Some(start) => {
                let elapsed = now.signed_duration_since(start);
                if elapsed < Duration::zero() {
                    self.diagnostics.warn(
                        now,
                        competitor.id,
                        WarningKind::NegativePenaltyDuration,
                        format!("negative penalty lap duration {} ignored", format_duration(elapsed)),
                    );
                } else {
                    competitor.total_penalty_time = competitor.total_penalty_time + elapsed;
                }
            }
            None => self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::MissingPenaltyStart,
                "left penalty laps but the entry time was not recorded",
            ),
        }

        competitor.total_penalty_laps += competitor.misses_to_penalize;
        competitor.misses_to_penalize = 0;
        competitor.status = CompetitorStatus::Started;
    }

    fn on_end_lap(&mut self, competitor: &mut Competitor, now: Timestamp) {
        if competitor.status != CompetitorStatus::Started {
            self.unexpected_status(competitor.id, now, EventKind::EndLap, competitor.status, "Started");
        }

        let Some(lap_start) = competitor.current_lap_start.filter(|_| competitor.current_lap > 0)
        else {
            self.diagnostics.warn(
                now,
                competitor.id,
                WarningKind::LapWithoutStart,
                "ended a lap before starting, event ignored",
            );
            return;
        };

        let duration = now.signed_duration_since(lap_start);
        let speed = calculate_speed(self.config.lap_len, duration);
        competitor.record_lap(competitor.current_lap, LapDetail { duration, speed });

        if competitor.current_lap >= self.config.laps {
            if competitor.firing_lines_completed < self.config.firing_lines {
                self.diagnostics.warn(
                    now,
                    competitor.id,
                    WarningKind::IncompleteFiringLines,
                    format!(
                        "finishing but not all {} firing lines completed (completed {})",
                        self.config.firing_lines, competitor.firing_lines_completed
                    ),
                );
            }
            self.finish(competitor, now);
        } else {
            competitor.current_lap += 1;
            competitor.current_lap_start = Some(now);
        }
    }

    fn on_cannot_continue(&mut self, competitor: &mut Competitor, event: &Event) {
        competitor.status = CompetitorStatus::NotFinished;
        competitor.finish_time = Some(event.timestamp());
        competitor.reason = Some(non_empty_or_default(event.extra_text()));
        competitor.penalty_summary = competitor.summarize_penalties(self.config.penalty_len);
        log::info!(
            "Competitor {} can't continue at {}",
            competitor.id,
            format_timestamp(event.timestamp())
        );
    }

    /// Finish a competitor and emit the derived Finished event
    ///
    /// No-op for competitors already in a terminal status.
    fn finish(&mut self, competitor: &mut Competitor, at: Timestamp) {
        if competitor.is_terminal() {
            return;
        }

        competitor.status = CompetitorStatus::Finished;
        competitor.finish_time = Some(at);
        competitor.penalty_summary = competitor.summarize_penalties(self.config.penalty_len);

        log::info!("Competitor {} finished at {}", competitor.id, format_timestamp(at));
        self.emit(Event::derived(at, EventKind::Finished, competitor.id, Vec::new()));
    }

    /// Disqualify a competitor and emit at most one derived Disqualified event
    ///
    /// The `NotStarted` reason maps to the NotStarted status, anything else to
    /// Disqualified. No-op for competitors already in a terminal status.
    fn disqualify(&mut self, competitor: &mut Competitor, at: Timestamp, reason: &str) {
        if competitor.is_terminal() {
            return;
        }

        competitor.finish_time = Some(at);
        competitor.status = if reason == NOT_STARTED_REASON {
            CompetitorStatus::NotStarted
        } else {
            CompetitorStatus::Disqualified
        };
        competitor.reason = Some(reason.to_string());

        log::info!(
            "Competitor {} disqualified at {} ({})",
            competitor.id,
            format_timestamp(at),
            reason
        );

        let already_emitted = self.history.iter().any(|e| {
            !e.is_incoming() && e.kind() == EventKind::Disqualified && e.competitor() == competitor.id
        });
        if !already_emitted {
            self.emit(Event::derived(
                at,
                EventKind::Disqualified,
                competitor.id,
                vec![reason.to_string()],
            ));
        }
    }

    fn emit(&mut self, event: Event) {
        self.narration.push(event.narration());
        self.history.push(event);
    }

    fn unexpected_status(
        &mut self,
        competitor: CompetitorId,
        now: Timestamp,
        kind: EventKind,
        status: CompetitorStatus,
        expected: &str,
    ) {
        self.diagnostics.warn(
            now,
            competitor,
            WarningKind::UnexpectedStatus,
            format!(
                "event {} in unexpected status {} (expected {})",
                kind, status, expected
            ),
        );
    }
}

fn non_empty_or_default(text: String) -> String {
    if text.is_empty() {
        UNSPECIFIED_REASON.to_string()
    } else {
        text
    }
}

/// Final, read-only result of a race run
#[derive(Debug, Clone)]
pub struct RaceOutcome {
    config: RaceConfig,
    competitors: BTreeMap<CompetitorId, Competitor>,
    history: Vec<Event>,
    narration: Vec<String>,
    diagnostics: Diagnostics,
}

impl RaceOutcome {
    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn competitor(&self, id: CompetitorId) -> Option<&Competitor> {
        self.competitors.get(&id)
    }

    /// All competitors in ascending ID order
    pub fn competitors(&self) -> impl Iterator<Item = &Competitor> {
        self.competitors.values()
    }

    pub fn narration(&self) -> &[String] {
        &self.narration
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Competitors in ranking order
    pub fn ranked(&self) -> Vec<&Competitor> {
        ranking::rank(self.competitors.values())
    }

    /// One report line per competitor, in ranking order
    pub fn report_lines(&self) -> Vec<String> {
        ranking::report_lines(self.competitors.values())
    }
}

/// Read events from `input`, apply them all and run the not-started check
///
/// Errors carry the line number and raw text of the offending line.
pub fn run_race<R: BufRead>(config: RaceConfig, input: R) -> Result<RaceOutcome> {
    let mut engine = RaceEngine::new(config);

    for item in EventReader::new(input) {
        let NumberedEvent {
            line_no,
            line,
            event,
        } = item?;
        engine.apply(event).map_err(|e| e.at_line(line_no, line))?;
    }

    engine.check_for_not_started();

    log::info!(
        "Processed {} events for {} competitors ({} warnings)",
        engine.history().len(),
        engine.competitors.len(),
        engine.diagnostics().len()
    );

    Ok(engine.into_outcome())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningKind;
    use crate::types::ErrorCategory;

    fn config() -> RaceConfig {
        RaceConfig::new(
            2,
            3500.0,
            150.0,
            1,
            parse_timestamp("10:00:00.000").unwrap(),
            Duration::seconds(30),
        )
        .unwrap()
    }

    fn apply_all(engine: &mut RaceEngine, lines: &[&str]) {
        for line in lines {
            engine.apply(Event::parse(line).unwrap()).unwrap();
        }
    }

    fn started(id: u32) -> Vec<String> {
        vec![
            format!("[09:59:00.000] 1 {id}"),
            format!("[09:59:01.000] 2 {id} 10:00:00.000"),
            format!("[09:59:59.000] 3 {id}"),
            format!("[10:00:00.000] 4 {id}"),
        ]
    }

    fn engine_with_started(id: u32) -> RaceEngine {
        let mut engine = RaceEngine::new(config());
        let lines = started(id);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        apply_all(&mut engine, &lines);
        engine
    }

    #[test]
    fn test_register_creates_competitor() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[09:59:00.000] 1 7"]);

        let competitor = engine.competitor(7).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Registered);
        assert_eq!(engine.narration().len(), 1);
    }

    #[test]
    fn test_duplicate_registration_warns() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[09:59:00.000] 1 7", "[09:59:01.000] 1 7"]);

        assert_eq!(engine.competitors().count(), 1);
        assert!(engine.diagnostics().contains(WarningKind::DuplicateRegistration));
        assert_eq!(engine.narration().len(), 2);
    }

    #[test]
    fn test_unregistered_competitor_is_fatal() {
        let mut engine = RaceEngine::new(config());
        let err = engine
            .apply(Event::parse("[10:00:00.000] 4 999").unwrap())
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert!(matches!(
            err,
            RaceError::UnregisteredCompetitor { competitor: 999, kind: 4 }
        ));
        assert!(err.to_string().contains("999"));
    }

    #[test]
    fn test_timestamp_regression_is_fatal() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[10:00:00.000] 1 1"]);

        let err = engine
            .apply(Event::parse("[09:59:59.999] 1 2").unwrap())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Ordering);
        assert!(engine.competitor(2).is_none());
    }

    #[test]
    fn test_equal_timestamps_are_accepted() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[10:00:00.000] 1 1", "[10:00:00.000] 1 2"]);
        assert_eq!(engine.competitors().count(), 2);
    }

    #[test]
    fn test_start_on_time() {
        let engine = engine_with_started(1);
        let competitor = engine.competitor(1).unwrap();

        assert_eq!(competitor.status, CompetitorStatus::Started);
        assert_eq!(competitor.current_lap, 1);
        assert_eq!(competitor.actual_start, parse_timestamp("10:00:00.000").ok());
        assert!(engine.diagnostics().is_empty());
    }

    #[test]
    fn test_late_start_is_not_started() {
        let mut engine = RaceEngine::new(config());
        apply_all(
            &mut engine,
            &[
                "[09:59:00.000] 1 1",
                "[09:59:01.000] 2 1 10:00:00.000",
                "[10:00:30.001] 4 1",
            ],
        );

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::NotStarted);
        assert_eq!(competitor.actual_start, None);
        assert_eq!(competitor.reason.as_deref(), Some(NOT_STARTED_REASON));
        assert_eq!(
            engine.narration().last().unwrap(),
            "[10:00:30.001] The competitor(1) is disqualified (NotStarted)"
        );
    }

    #[test]
    fn test_start_exactly_at_deadline_is_accepted() {
        let mut engine = RaceEngine::new(config());
        apply_all(
            &mut engine,
            &[
                "[09:59:00.000] 1 1",
                "[09:59:01.000] 2 1 10:00:00.000",
                "[10:00:30.000] 4 1",
            ],
        );
        assert_eq!(engine.competitor(1).unwrap().status, CompetitorStatus::Started);
    }

    #[test]
    fn test_events_after_final_status_are_ignored() {
        let mut engine = RaceEngine::new(config());
        apply_all(
            &mut engine,
            &[
                "[09:59:00.000] 1 1",
                "[09:59:01.000] 2 1 10:00:00.000",
                "[10:01:00.000] 4 1",
                "[10:05:00.000] 5 1 1",
            ],
        );

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::NotStarted);
        assert!(engine.diagnostics().contains(WarningKind::AfterFinalStatus));
    }

    #[test]
    fn test_set_start_time_requires_value() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[09:59:00.000] 1 1"]);

        let missing = engine.apply(Event::parse("[09:59:01.000] 2 1").unwrap()).unwrap_err();
        assert!(matches!(missing, RaceError::MissingParameter { competitor: 1, .. }));

        let invalid = engine
            .apply(Event::parse("[09:59:02.000] 2 1 soon").unwrap())
            .unwrap_err();
        assert!(matches!(invalid, RaceError::InvalidParameter { competitor: 1, .. }));
        assert_eq!(invalid.category(), ErrorCategory::Parse);
    }

    #[test]
    fn test_on_start_line_in_wrong_status_warns() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:00:01.000] 3 1"]);

        assert_eq!(engine.competitor(1).unwrap().status, CompetitorStatus::Started);
        assert!(engine.diagnostics().contains(WarningKind::UnexpectedStatus));
    }

    #[test]
    fn test_clean_shooting_returns_to_started() {
        let mut engine = engine_with_started(1);
        apply_all(
            &mut engine,
            &[
                "[10:05:00.000] 5 1 1",
                "[10:05:01.000] 6 1 1",
                "[10:05:02.000] 6 1 2",
                "[10:05:03.000] 6 1 3",
                "[10:05:04.000] 6 1 4",
                "[10:05:05.000] 6 1 5",
                "[10:05:10.000] 7 1",
            ],
        );

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Started);
        assert_eq!(competitor.total_hits, 5);
        assert_eq!(competitor.total_shots, 5);
        assert_eq!(competitor.misses_to_penalize, 0);
        assert_eq!(competitor.firing_lines_completed, 1);
    }

    #[test]
    fn test_misses_keep_competitor_on_range_until_penalty() {
        let mut engine = engine_with_started(1);
        apply_all(
            &mut engine,
            &[
                "[10:05:00.000] 5 1 1",
                "[10:05:01.000] 6 1 1",
                "[10:05:10.000] 7 1",
            ],
        );

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Firing);
        assert_eq!(competitor.misses_to_penalize, 4);

        apply_all(&mut engine, &["[10:06:00.000] 8 1", "[10:06:40.000] 9 1"]);
        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Started);
        assert_eq!(competitor.total_penalty_laps, 4);
        assert_eq!(competitor.total_penalty_time, Duration::seconds(40));
        assert_eq!(competitor.misses_to_penalize, 0);
        assert_eq!(competitor.penalty_start, None);
    }

    #[test]
    fn test_hit_outside_range_is_not_counted() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:01:00.000] 6 1 1"]);

        assert_eq!(engine.competitor(1).unwrap().total_hits, 0);
        assert!(engine.diagnostics().contains(WarningKind::UnexpectedStatus));
    }

    #[test]
    fn test_firing_line_number_errors() {
        let mut engine = engine_with_started(1);

        let missing = engine.apply(Event::parse("[10:05:00.000] 5 1").unwrap()).unwrap_err();
        assert!(matches!(missing, RaceError::MissingParameter { .. }));

        let invalid = engine
            .apply(Event::parse("[10:05:00.000] 5 1 first").unwrap())
            .unwrap_err();
        assert!(matches!(invalid, RaceError::InvalidParameter { .. }));
        assert_eq!(invalid.category(), ErrorCategory::Parse);

        let out_of_range = engine
            .apply(Event::parse("[10:05:00.000] 5 1 2").unwrap())
            .unwrap_err();
        assert!(matches!(
            out_of_range,
            RaceError::FiringLineOutOfRange { line: 2, configured: 1, .. }
        ));
        assert!(engine.diagnostics().contains(WarningKind::FiringLineMismatch));
    }

    #[test]
    fn test_extra_firing_line_disqualifies() {
        let mut engine = engine_with_started(1);
        apply_all(
            &mut engine,
            &[
                "[10:05:00.000] 5 1 1",
                "[10:05:10.000] 7 1",
                "[10:06:00.000] 8 1",
                "[10:07:00.000] 9 1",
                "[10:08:00.000] 5 1 1",
            ],
        );

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Disqualified);
        assert_eq!(competitor.reason.as_deref(), Some(EXTRA_FIRING_LINE_REASON));
        assert!(engine.diagnostics().contains(WarningKind::ExtraFiringLine));
        assert_eq!(
            engine.narration().last().unwrap(),
            "[10:08:00.000] The competitor(1) is disqualified (Extra firing line)"
        );
    }

    #[test]
    fn test_leave_range_without_entering() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:05:10.000] 7 1"]);

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.total_shots, 0);
        assert_eq!(competitor.status, CompetitorStatus::Started);
        assert!(engine.diagnostics().contains(WarningKind::UnexpectedStatus));
    }

    #[test]
    fn test_penalty_laps_without_misses_are_skipped() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:06:00.000] 8 1"]);

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Started);
        assert_eq!(competitor.penalty_start, None);
        assert!(engine.diagnostics().contains(WarningKind::NoOutstandingPenalty));
    }

    #[test]
    fn test_penalty_laps_disabled() {
        // Not constructible from a config file; exercised directly
        let mut engine = RaceEngine::new(config().with_penalty_len(0.0));
        let lines = started(1);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        apply_all(&mut engine, &lines);
        apply_all(
            &mut engine,
            &["[10:05:00.000] 5 1 1", "[10:05:10.000] 7 1", "[10:06:00.000] 8 1"],
        );

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Started);
        assert_eq!(competitor.misses_to_penalize, 5);
        assert!(engine.diagnostics().contains(WarningKind::PenaltyLapsDisabled));
    }

    #[test]
    fn test_leave_penalty_without_entering_is_ignored() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:06:00.000] 9 1"]);

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.total_penalty_laps, 0);
        assert!(engine.diagnostics().contains(WarningKind::MissingPenaltyStart));
    }

    #[test]
    fn test_end_lap_before_start_is_ignored() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[09:59:00.000] 1 1", "[10:10:00.000] 10 1"]);

        let competitor = engine.competitor(1).unwrap();
        assert!(competitor.laps.is_empty());
        assert!(engine.diagnostics().contains(WarningKind::LapWithoutStart));
    }

    #[test]
    fn test_last_lap_finishes_even_with_missing_firing_lines() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:10:00.000] 10 1", "[10:20:00.000] 10 1"]);

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Finished);
        assert_eq!(competitor.laps.len(), 2);
        assert_eq!(competitor.lap(2).unwrap().duration, Duration::minutes(10));
        assert!(engine.diagnostics().contains(WarningKind::IncompleteFiringLines));
        assert_eq!(
            engine.narration().last().unwrap(),
            "[10:20:00.000] The competitor(1) has finished"
        );
    }

    #[test]
    fn test_cannot_continue() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:03:00.000] 11 1 Lost in the forest"]);

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::NotFinished);
        assert_eq!(competitor.reason.as_deref(), Some("Lost in the forest"));
        assert_eq!(competitor.finish_time, parse_timestamp("10:03:00.000").ok());

        apply_all(&mut engine, &["[10:04:00.000] 11 1"]);
        assert!(engine.diagnostics().contains(WarningKind::AfterFinalStatus));
        assert_eq!(
            engine.competitor(1).unwrap().reason.as_deref(),
            Some("Lost in the forest")
        );
    }

    #[test]
    fn test_cannot_continue_default_reason() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:03:00.000] 11 1"]);
        assert_eq!(
            engine.competitor(1).unwrap().reason.as_deref(),
            Some(UNSPECIFIED_REASON)
        );
    }

    #[test]
    fn test_unknown_event_kind_is_fatal() {
        let mut engine = RaceEngine::new(config());
        apply_all(&mut engine, &["[09:59:00.000] 1 1"]);

        let err = engine.apply(Event::parse("[09:59:01.000] 12 1").unwrap()).unwrap_err();
        assert!(matches!(err, RaceError::UnknownEventKind { competitor: 1, kind: 12 }));
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert_eq!(engine.competitor(1).unwrap().status, CompetitorStatus::Registered);
        assert_eq!(engine.narration().len(), 1);
    }

    #[test]
    fn test_run_race_aborts_on_unknown_event_kind() {
        let input = "[09:59:00.000] 1 1\n[09:59:01.000] 12 1\n";
        let err = run_race(config(), input.as_bytes()).unwrap_err();

        assert_eq!(err.line_no(), Some(2));
        assert!(matches!(err.root(), RaceError::UnknownEventKind { kind: 12, .. }));
    }

    #[test]
    fn test_raw_disqualification_is_narrated_once() {
        let mut engine = engine_with_started(1);
        apply_all(&mut engine, &["[10:01:00.000] 32 1 false start"]);

        let competitor = engine.competitor(1).unwrap();
        assert_eq!(competitor.status, CompetitorStatus::Disqualified);
        assert_eq!(competitor.reason.as_deref(), Some("false start"));
        assert!(engine.diagnostics().contains(WarningKind::DerivedEventInInput));

        let dq_lines = engine
            .narration()
            .iter()
            .filter(|line| line.contains("disqualified"))
            .count();
        assert_eq!(dq_lines, 1);

        apply_all(&mut engine, &["[10:02:00.000] 32 1 again"]);
        let dq_lines = engine
            .narration()
            .iter()
            .filter(|line| line.contains("disqualified"))
            .count();
        assert_eq!(dq_lines, 1);
    }

    #[test]
    fn test_check_for_not_started() {
        let mut engine = RaceEngine::new(config());
        apply_all(
            &mut engine,
            &[
                "[09:59:00.000] 1 1",
                "[09:59:00.000] 1 2",
                "[09:59:01.000] 2 1 10:00:00.000",
                "[09:59:30.000] 3 1",
                "[10:00:00.000] 1 3",
                "[10:00:00.000] 2 3 10:00:00.000",
                "[10:00:00.000] 4 3",
                "[10:05:00.000] 11 3",
            ],
        );
        engine.check_for_not_started();

        let scheduled = engine.competitor(1).unwrap();
        assert_eq!(scheduled.status, CompetitorStatus::NotStarted);
        assert_eq!(scheduled.finish_time, parse_timestamp("10:00:30.000").ok());

        // No scheduled start: left as it is
        assert_eq!(engine.competitor(2).unwrap().status, CompetitorStatus::Registered);
        assert_eq!(engine.competitor(3).unwrap().status, CompetitorStatus::NotFinished);
        assert_eq!(
            engine.narration().last().unwrap(),
            "[10:00:30.000] The competitor(1) is disqualified (NotStarted)"
        );
    }

    #[test]
    fn test_check_for_not_started_waits_for_deadline() {
        let mut engine = RaceEngine::new(config());
        apply_all(
            &mut engine,
            &["[09:59:00.000] 1 1", "[09:59:01.000] 2 1 10:00:00.000", "[10:00:30.000] 1 2"],
        );
        engine.check_for_not_started();

        assert_eq!(engine.competitor(1).unwrap().status, CompetitorStatus::Registered);
    }

    #[test]
    fn test_run_race_reports_line_numbers() {
        let input = "[09:59:00.000] 1 1\n\n[10:00:00.000] 4 2\n";
        let err = run_race(config(), input.as_bytes()).unwrap_err();

        assert_eq!(err.line_no(), Some(3));
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert!(err.to_string().contains("[10:00:00.000] 4 2"));
    }

    #[test]
    fn test_run_race_reports_ordering_line() {
        let input = "[10:00:00.000] 1 1\n[09:00:00.000] 1 2\n";
        let err = run_race(config(), input.as_bytes()).unwrap_err();

        assert_eq!(err.line_no(), Some(2));
        assert_eq!(err.category(), ErrorCategory::Ordering);
    }
}
