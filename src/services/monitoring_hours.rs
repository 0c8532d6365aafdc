use crate::constants::{DEFAULT_END_TIME, DEFAULT_START_TIME, PARAM_DAILY_EMAIL_TIME, PARAM_END_TIME, PARAM_START_TIME};
use crate::models::TimeOfDay;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Monitoring window read from the parameters table
///
/// Inclusive on both ends. Windows that cross midnight (`start > end`) are not
/// supported and contain no time at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Default for MonitoringWindow {
    fn default() -> Self {
        Self {
            start: default_time(DEFAULT_START_TIME),
            end: default_time(DEFAULT_END_TIME),
        }
    }
}

fn default_time(s: &str) -> TimeOfDay {
    TimeOfDay::parse(s).unwrap_or(TimeOfDay::MIDNIGHT)
}

impl MonitoringWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Build the window from `start_time`/`end_time`, falling back per field
    pub fn from_parameters(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let start = read_time(params, PARAM_START_TIME).unwrap_or(defaults.start);
        let end = read_time(params, PARAM_END_TIME).unwrap_or(defaults.end);

        let window = Self { start, end };
        if window.crosses_midnight() {
            tracing::warn!(
                start = %window.start,
                end = %window.end,
                "Monitoring window crosses midnight, which is not supported; no ticks will be evaluated"
            );
        }
        window
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Check whether a time of day lies inside the window
    pub fn contains(&self, time: TimeOfDay) -> bool {
        self.start <= time && time <= self.end
    }

    /// Check whether the clock hour lies in the window's hour range
    ///
    /// Collection is gated on whole hours, so a 08:30–17:15 window collects at
    /// 08:00 and at 17:00.
    pub fn contains_hour(&self, hour: u32) -> bool {
        self.start.hour() <= hour && hour <= self.end.hour()
    }
}

/// Daily summary time, when the parameter is present and valid
pub fn daily_email_time(params: &HashMap<String, String>) -> Option<TimeOfDay> {
    read_time(params, PARAM_DAILY_EMAIL_TIME)
}

fn read_time(params: &HashMap<String, String>, name: &str) -> Option<TimeOfDay> {
    let raw = params.get(name)?;
    match TimeOfDay::parse(raw) {
        Ok(time) => Some(time),
        Err(e) => {
            tracing::warn!(parameter = name, value = %raw, error = %e, "Ignoring invalid time parameter");
            None
        }
    }
}

/// Current time in the configured timezone
pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

/// UTC bounds `[start, end)` of a calendar day in the given timezone
pub fn day_bounds_utc(day: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(day, tz);
    let end = day
        .succ_opt()
        .map(|next| start_of_day(next, tz))
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

fn start_of_day(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST change: the day starts at the first valid hour
        None => (1..=3)
            .filter_map(|h| midnight.with_hour(h))
            .find_map(|t| tz.from_local_datetime(&t).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}
