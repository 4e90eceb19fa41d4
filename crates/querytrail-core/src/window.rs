//! Time window for query history extraction

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

/// `[start, end)` range of query history to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window covering the `days` full days before `now`
    ///
    /// Both bounds are truncated to midnight UTC.
    pub fn for_duration(days: u32, now: DateTime<Utc>) -> Self {
        let end = midnight(now);
        let start = end - Duration::days(i64::from(days));
        Self { start, end }
    }

    /// Copy with the end bound moved `days` later
    pub fn extended_by_days(&self, days: i64) -> Self {
        Self {
            start: self.start,
            end: self.end + Duration::days(days),
        }
    }

    /// Day the extracted usage is attributed to
    pub fn analysis_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Start bound in `YYYY-MM-DD HH:MM:SS` form for SQL templates
    pub fn start_sql(&self) -> String {
        self.start.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// End bound in `YYYY-MM-DD HH:MM:SS` form for SQL templates
    pub fn end_sql(&self) -> String {
        self.end.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_sql(), self.end_sql())
    }
}

fn midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(at)
}
