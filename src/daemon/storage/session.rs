use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::utils::time::{format_timestamp, parse_timestamp, TimeSpent};

/// Fixed header row, written exactly once per record file.
pub const RECORD_HEADER: [&str; 11] = [
    "window", "program", "url", "domain", "started", "stopped", "spent", "days", "hours",
    "minutes", "seconds",
];

pub const RECORD_DELIMITER: &str = ",";

/// A finalized, timed interval of continuous foreground occupancy by one window/program pair.
/// Handed to the record writer the moment it is closed and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub window: Arc<str>,
    pub program: Arc<str>,
    pub url: Option<Arc<str>>,
    pub domain: Option<Arc<str>>,
    pub started: DateTime<Local>,
    pub stopped: DateTime<Local>,
}

impl Session {
    pub fn duration_seconds(&self) -> u64 {
        (self.stopped - self.started).num_seconds().max(0) as u64
    }

    pub fn time_spent(&self) -> TimeSpent {
        TimeSpent::from_seconds(self.duration_seconds())
    }

    /// Serializes into one record line. Absent fields become empty, the breakdown fields are
    /// zero-padded.
    pub fn to_record_line(&self) -> String {
        let spent = self.time_spent();
        [
            self.window.to_string(),
            self.program.to_string(),
            self.url.as_deref().unwrap_or("").to_string(),
            self.domain.as_deref().unwrap_or("").to_string(),
            format_timestamp(self.started),
            format_timestamp(self.stopped),
            self.duration_seconds().to_string(),
            format!("{:02}", spent.days),
            format!("{:02}", spent.hours),
            format!("{:02}", spent.minutes),
            format!("{:02}", spent.seconds),
        ]
        .join(RECORD_DELIMITER)
    }

    /// Rebuilds a session from a record line. The spent and breakdown fields are derived data and
    /// are recomputed rather than read back.
    pub fn parse_record_line(line: &str) -> Option<Session> {
        let fields: Vec<&str> = line.split(RECORD_DELIMITER).collect();
        if fields.len() != RECORD_HEADER.len() {
            return None;
        }
        Some(Session {
            window: non_empty(fields[0])?,
            program: non_empty(fields[1])?,
            url: non_empty(fields[2]),
            domain: non_empty(fields[3]),
            started: parse_timestamp(fields[4])?,
            stopped: parse_timestamp(fields[5])?,
        })
    }
}

fn non_empty(value: &str) -> Option<Arc<str>> {
    (!value.is_empty()).then(|| value.into())
}
