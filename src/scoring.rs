// Fragment scoring and leaderboard ranking.
//
// A fragment is worth 100 points when solved the moment its team is created
// and loses 2 points per whole elapsed minute, never dropping below 0.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_FRAGMENT_SCORE: u32 = 100;
pub const DECAY_PER_MINUTE: f64 = 2.0;

/// Parse a stored RFC 3339 timestamp. Anything else counts as invalid.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole minutes from `start` to `end`, floored, never negative.
/// Invalid or missing timestamps count as zero minutes.
pub fn minutes_between(start: &str, end: &str) -> i64 {
    match (parse_timestamp(start), parse_timestamp(end)) {
        (Some(s), Some(e)) => (e - s).num_milliseconds().div_euclid(60_000).max(0),
        _ => 0,
    }
}

/// Score for a fragment solved `minutes` after team creation.
pub fn fragment_score(minutes: i64) -> u32 {
    let raw = (MAX_FRAGMENT_SCORE as f64 - DECAY_PER_MINUTE * minutes as f64).round();
    raw.clamp(0.0, MAX_FRAGMENT_SCORE as f64) as u32
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub solved: bool,
    pub score: u32,
}

/// Order leaderboard rows: solved teams first, then total score descending,
/// then earliest creation first. Invalid creation timestamps sort as the epoch.
/// The sort is stable, so remaining ties keep their input order.
pub fn rank(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(compare_entries);
}

fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.solved
        .cmp(&a.solved)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| creation_millis(&a.created_at).cmp(&creation_millis(&b.created_at)))
}

fn creation_millis(raw: &str) -> i64 {
    parse_timestamp(raw)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}
