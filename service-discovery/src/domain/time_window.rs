//! Time-of-day windows.

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

/// A window on the current local date, given as `HH:MM` start and end.
///
/// Both ends are inclusive. A window whose end lies before its start never
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start time in HH:MM format.
    pub start: String,
    /// End time in HH:MM format.
    pub end: String,
}

impl TimeWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Check that both ends are valid times.
    pub fn validate(&self) -> Result<(), String> {
        for t in [&self.start, &self.end] {
            if parse_time(t).is_none() {
                return Err(format!("invalid time of day '{t}', expected HH:MM"));
            }
        }
        Ok(())
    }

    /// Whether `now` falls inside the window.
    pub fn contains<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let local = now.with_timezone(&Local);
        let current = local.time();
        match (parse_time(&self.start), parse_time(&self.end)) {
            (Some(start), Some(end)) => start <= current && current <= end,
            _ => false,
        }
    }
}

/// Parse a time string in HH:MM format.
fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}
