//! Native Windows timestamps (FILETIME)
//!
//! The recycle store records every time as a count of 100-nanosecond
//! ticks since 1601-01-01 00:00:00 UTC. Host filesystems report
//! `SystemTime`, which is converted into the same representation so that
//! index records and directory entries share one type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1601-01-01 and 1970-01-01
const EPOCH_DIFFERENCE_SECS: u64 = 11_644_473_600;

/// FILETIME resolution
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Report rendering, matching the original dumper's `%4d-%02d-%02d %02d:%02d:%02d`
pub const REPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A timestamp in 100-ns ticks since 1601-01-01 UTC
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileTime(u64);

impl FileTime {
    pub const fn from_ticks(ticks: u64) -> Self {
        FileTime(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Convert a host timestamp; `None` when it predates 1601
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let epoch_ticks = EPOCH_DIFFERENCE_SECS * TICKS_PER_SECOND;
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => {
                let ticks = after
                    .as_secs()
                    .checked_mul(TICKS_PER_SECOND)?
                    .checked_add(u64::from(after.subsec_nanos()) / 100)?;
                epoch_ticks.checked_add(ticks).map(FileTime)
            }
            Err(before) => {
                let before = before.duration();
                let ticks = before
                    .as_secs()
                    .checked_mul(TICKS_PER_SECOND)?
                    .checked_add(u64::from(before.subsec_nanos()) / 100)?;
                epoch_ticks.checked_sub(ticks).map(FileTime)
            }
        }
    }

    pub fn from_datetime(time: DateTime<Utc>) -> Option<Self> {
        let secs = u64::try_from(time.timestamp() + EPOCH_DIFFERENCE_SECS as i64).ok()?;
        secs.checked_mul(TICKS_PER_SECOND)?
            .checked_add(u64::from(time.timestamp_subsec_nanos()) / 100)
            .map(FileTime)
    }

    /// Calendar time, or `None` for tick counts Windows itself refuses to convert
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.0 > i64::MAX as u64 {
            return None;
        }
        let secs = (self.0 / TICKS_PER_SECOND) as i64 - EPOCH_DIFFERENCE_SECS as i64;
        let nanos = ((self.0 % TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

/// Renders as the report column text; unrepresentable times render empty.
impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(time) => write!(f, "{}", time.format(REPORT_TIME_FORMAT)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_known_filetime() {
        // 2020-01-01 00:00:00 UTC
        let ft = FileTime::from_ticks(132_223_104_000_000_000);
        assert_eq!(ft.to_string(), "2020-01-01 00:00:00");
        assert_eq!(
            ft.to_datetime(),
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_filetime_epoch() {
        assert_eq!(FileTime::from_ticks(0).to_string(), "1601-01-01 00:00:00");
    }

    #[test]
    fn test_out_of_range_renders_empty() {
        let ft = FileTime::from_ticks(u64::MAX);
        assert_eq!(ft.to_datetime(), None);
        assert_eq!(ft.to_string(), "");
    }

    #[test]
    fn test_system_time_conversion() {
        let unix = UNIX_EPOCH + Duration::from_secs(1_577_836_800);
        let ft = FileTime::from_system_time(unix).unwrap();
        assert_eq!(ft.ticks(), 132_223_104_000_000_000);

        let before_unix = UNIX_EPOCH - Duration::from_secs(86_400);
        let ft = FileTime::from_system_time(before_unix).unwrap();
        assert_eq!(ft.to_string(), "1969-12-31 00:00:00");
    }

    #[test]
    fn test_datetime_round_trip() {
        let time = Utc.with_ymd_and_hms(2023, 6, 15, 12, 30, 45).unwrap();
        let ft = FileTime::from_datetime(time).unwrap();
        assert_eq!(ft.to_datetime(), Some(time));
    }
}
