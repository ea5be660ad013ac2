use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};

/// This is the standard way of formatting a timestamp in record files: local wall-clock time
/// truncated to whole seconds.
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(moment: DateTime<Local>) -> String {
    moment.format(RECORD_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value, RECORD_TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

/// Drops the sub-second part of a timestamp. Durations and record timestamps are whole seconds.
pub fn truncate_to_seconds(moment: DateTime<Local>) -> DateTime<Local> {
    moment
        .with_nanosecond(0)
        .expect("zero nanoseconds is always in range")
}

/// Decomposition of a whole number of seconds into days, hours, minutes and seconds. Serialized
/// into the four trailing fields of a record line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpent {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeSpent {
    pub fn from_seconds(total: u64) -> Self {
        let (minutes, seconds) = (total / 60, total % 60);
        let (hours, minutes) = (minutes / 60, minutes % 60);
        let (days, hours) = (hours / 24, hours % 24);
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        ((self.days * 24 + self.hours) * 60 + self.minutes) * 60 + self.seconds
    }
}

#[cfg(test)]
mod tests {
    use super::TimeSpent;

    #[test]
    fn test_spent_decomposition() {
        assert_eq!(
            TimeSpent::from_seconds(0),
            TimeSpent {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 0
            }
        );
        assert_eq!(
            TimeSpent::from_seconds(59),
            TimeSpent {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 59
            }
        );
        assert_eq!(
            TimeSpent::from_seconds(3600 + 61),
            TimeSpent {
                days: 0,
                hours: 1,
                minutes: 1,
                seconds: 1
            }
        );
        assert_eq!(
            TimeSpent::from_seconds(2 * 86400 + 3 * 3600 + 4 * 60 + 5),
            TimeSpent {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5
            }
        );
    }

    #[test]
    fn test_spent_decomposition_reverses() {
        for total in [0u64, 1, 59, 60, 3599, 3600, 86399, 86400, 1_000_000] {
            assert_eq!(TimeSpent::from_seconds(total).total_seconds(), total);
        }
    }
}
