use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock time of day with minute resolution
///
/// Ordered by (hour, minute), which is the same order the zero-padded
/// `HH:MM` strings in the parameters table sort in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `HH:MM` (a single-digit hour such as `8:00` is accepted too)
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid time '{}': expected HH:MM", s))?;

        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(format!("Invalid time '{}': expected HH:MM", s));
        }

        let hour: u32 = hour
            .parse()
            .map_err(|_| format!("Invalid hour in '{}'", s))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| format!("Invalid minute in '{}'", s))?;

        Self::new(hour, minute).ok_or_else(|| format!("Time out of range: '{}'", s))
    }

    /// Time of day of a timestamp, seconds dropped
    pub fn of<T: Timelike>(time: &T) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
