//! Ranking and report formatting
//!
//! Orders finalized competitors (finishers by total time, then everyone else
//! by how far they got) and renders one report line per competitor:
//!
//! ```text
//! 00:20:00.000 1 [{00:10:00.000, 5.833}, {00:10:00.000, 5.833}] {00:00:20.000, 30.000} 1/5
//! ```

use crate::competitor::{Competitor, CompetitorStatus, PenaltySummary};
use crate::time::format_duration;
use crate::types::{CompetitorId, Duration};
use serde::Serialize;
use std::cmp::Ordering;

/// Placeholder for a missing `{time, speed}` pair
pub const EMPTY_PAIR: &str = "{,}";

/// Ranking order between two competitors
///
/// Finished competitors come first, by ascending total time; the rest are
/// ordered NotFinished, NotStarted, Disqualified, then anything else. Ties
/// are broken by ascending ID.
pub fn compare(a: &Competitor, b: &Competitor) -> Ordering {
    let a_finished = a.status == CompetitorStatus::Finished;
    let b_finished = b.status == CompetitorStatus::Finished;

    match (a_finished, b_finished) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => match (a.total_time(), b.total_time()) {
            (Some(ta), Some(tb)) => ta.cmp(&tb).then(a.id.cmp(&b.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        },
        (false, false) => a
            .status
            .severity_rank()
            .cmp(&b.status.severity_rank())
            .then(a.id.cmp(&b.id)),
    }
}

/// Competitors in ranking order (stable)
pub fn rank<'a>(competitors: impl IntoIterator<Item = &'a Competitor>) -> Vec<&'a Competitor> {
    let mut ranked: Vec<&Competitor> = competitors.into_iter().collect();
    ranked.sort_by(|a, b| compare(a, b));
    ranked
}

/// Report lines for all competitors, in ranking order
pub fn report_lines<'a>(competitors: impl IntoIterator<Item = &'a Competitor>) -> Vec<String> {
    rank(competitors).into_iter().map(format_result_line).collect()
}

/// Render one report line
pub fn format_result_line(competitor: &Competitor) -> String {
    format!(
        "{} {} {} {} {}/{}",
        competitor.final_status_label(),
        competitor.id,
        format_laps(competitor),
        format_penalty(competitor),
        competitor.total_hits,
        competitor.total_shots
    )
}

/// Number of lap slots shown for a competitor
///
/// Recorded laps, extended up to the lap in progress for competitors still on
/// the course or stopped mid-race; nothing for those who never started.
fn lap_slots(competitor: &Competitor) -> usize {
    let recorded = competitor.laps.len();
    match competitor.status {
        CompetitorStatus::NotStarted => 0,
        CompetitorStatus::Finished => recorded,
        _ => recorded.max(competitor.current_lap as usize),
    }
}

/// Completed laps with a positive duration, by slot
fn lap_pairs(competitor: &Competitor) -> Vec<Option<(Duration, f64)>> {
    (0..lap_slots(competitor))
        .map(|index| {
            competitor
                .laps
                .get(index)
                .copied()
                .flatten()
                .filter(|lap| lap.duration > Duration::zero())
                .map(|lap| (lap.duration, lap.speed))
        })
        .collect()
}

fn format_pair(pair: Option<(Duration, f64)>) -> String {
    match pair {
        Some((duration, speed)) => format!("{{{}, {:.3}}}", format_duration(duration), speed),
        None => EMPTY_PAIR.to_string(),
    }
}

fn format_laps(competitor: &Competitor) -> String {
    let parts: Vec<String> = lap_pairs(competitor).into_iter().map(format_pair).collect();
    format!("[{}]", parts.join(", "))
}

/// Penalty pair as shown in the report, `None` if no penalty laps were served
fn penalty_pair(competitor: &Competitor) -> Option<(Duration, f64)> {
    if competitor.total_penalty_laps == 0 {
        return None;
    }
    // Laps served but nothing finalized (e.g. disqualified): zero pair
    let summary: PenaltySummary = competitor.penalty_summary.unwrap_or_default();
    if summary.total_duration <= Duration::zero() {
        return Some((Duration::zero(), 0.0));
    }
    Some((summary.total_duration, summary.average_speed))
}

fn format_penalty(competitor: &Competitor) -> String {
    format_pair(penalty_pair(competitor))
}

/// Structured form of a report line, for machine-readable output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub position: usize,
    pub result: String,
    pub id: CompetitorId,
    pub status: CompetitorStatus,
    pub laps: Vec<Option<TimedPair>>,
    pub penalty: Option<TimedPair>,
    pub hits: u32,
    pub shots: u32,
}

/// Formatted `{time, speed}` pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedPair {
    pub time: String,
    pub speed: f64,
}

impl From<(Duration, f64)> for TimedPair {
    fn from((duration, speed): (Duration, f64)) -> Self {
        Self {
            time: format_duration(duration),
            speed: (speed * 1000.0).round() / 1000.0,
        }
    }
}

/// Result rows for all competitors, in ranking order
pub fn result_rows<'a>(competitors: impl IntoIterator<Item = &'a Competitor>) -> Vec<ResultRow> {
    rank(competitors)
        .into_iter()
        .enumerate()
        .map(|(index, competitor)| ResultRow {
            position: index + 1,
            result: competitor.final_status_label(),
            id: competitor.id,
            status: competitor.status,
            laps: lap_pairs(competitor)
                .into_iter()
                .map(|pair| pair.map(TimedPair::from))
                .collect(),
            penalty: penalty_pair(competitor).map(TimedPair::from),
            hits: competitor.total_hits,
            shots: competitor.total_shots,
        })
        .collect()
}
