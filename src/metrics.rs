//! Trailing-week aggregation of logged sessions.
//!
//! The window is seven calendar days in the caller's time zone, today
//! included. Days are bucketed by the local date of each record's timestamp,
//! so a session logged at 23:30 counts for that evening even if UTC has
//! already rolled over.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::session::SessionRecord;

pub const WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub time: u64,
    pub blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    /// Exactly `WINDOW_DAYS` entries, oldest first.
    pub days: Vec<DailyTotal>,
    pub total_time: u64,
    pub total_blocks: u64,
    /// Total time over the fixed seven-day window, idle days included.
    pub weekly_average_secs: f64,
    /// `0.0` when no blocks were completed.
    pub avg_time_per_block_secs: f64,
}

/// First calendar day of the window ending on `now`'s date.
pub fn window_start<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    let today = now.date_naive();
    today - Duration::days(WINDOW_DAYS as i64 - 1)
}

/// Earliest instant that can fall inside the window: local midnight of the
/// first day, expressed in UTC for the storage query.
pub fn window_cutoff<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let start = window_start(now).and_time(NaiveTime::MIN);
    let tz = now.timezone();
    match tz.from_local_datetime(&start).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump. Widening the query is harmless,
        // bucketing still filters by date.
        None => Utc.from_utc_datetime(&start) - Duration::hours(24),
    }
}

pub fn summarize_week<Tz: TimeZone>(records: &[SessionRecord], now: &DateTime<Tz>) -> WeeklySummary {
    let tz = now.timezone();
    let first = window_start(now);

    let mut buckets: BTreeMap<NaiveDate, DailyTotal> = (0..WINDOW_DAYS as i64)
        .map(|offset| {
            let date = first + Duration::days(offset);
            (
                date,
                DailyTotal {
                    date,
                    time: 0,
                    blocks: 0,
                },
            )
        })
        .collect();

    for record in records {
        let Some(logged_at) = record.logged_at() else {
            log::warn!(
                "skipping session {} with unreadable timestamp '{}'",
                record.id,
                record.timestamp
            );
            continue;
        };
        let day = logged_at.with_timezone(&tz).date_naive();
        if let Some(bucket) = buckets.get_mut(&day) {
            bucket.time += record.time;
            bucket.blocks += u64::from(record.blocks);
        }
    }

    let days: Vec<DailyTotal> = buckets.into_values().collect();
    let total_time: u64 = days.iter().map(|d| d.time).sum();
    let total_blocks: u64 = days.iter().map(|d| d.blocks).sum();

    let avg_time_per_block_secs = if total_blocks > 0 {
        total_time as f64 / total_blocks as f64
    } else {
        0.0
    };

    WeeklySummary {
        days,
        total_time,
        total_blocks,
        weekly_average_secs: total_time as f64 / WINDOW_DAYS as f64,
        avg_time_per_block_secs,
    }
}
