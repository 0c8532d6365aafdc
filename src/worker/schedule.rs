use chrono::{DateTime, TimeDelta, TimeZone, Timelike};
use std::time::Duration;

/// Next instant strictly after `now` that falls on `minute` past an hour
pub fn next_fire_time<T: TimeZone>(now: &DateTime<T>, minute: u32) -> DateTime<T> {
    let into_hour = TimeDelta::seconds(i64::from(now.minute()) * 60 + i64::from(now.second()))
        + TimeDelta::nanoseconds(i64::from(now.nanosecond() % 1_000_000_000));
    let candidate = now.clone() - into_hour + TimeDelta::minutes(i64::from(minute));

    if candidate > *now {
        candidate
    } else {
        candidate + TimeDelta::hours(1)
    }
}

/// Start of the next whole minute after `now`
pub fn next_minute<T: TimeZone>(now: &DateTime<T>) -> DateTime<T> {
    let into_minute = TimeDelta::seconds(i64::from(now.second()))
        + TimeDelta::nanoseconds(i64::from(now.nanosecond() % 1_000_000_000));
    now.clone() - into_minute + TimeDelta::minutes(1)
}

/// Sleep length from `now` until `target`; zero when already past
pub fn until<T: TimeZone>(now: &DateTime<T>, target: &DateTime<T>) -> Duration {
    (target.clone() - now.clone()).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Tz;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, h, m, s).unwrap()
    }

    #[test]
    fn test_next_fire_time_same_hour() {
        assert_eq!(next_fire_time(&utc(10, 2, 30), 5), utc(10, 5, 0));
        assert_eq!(next_fire_time(&utc(10, 0, 0), 5), utc(10, 5, 0));
    }

    #[test]
    fn test_next_fire_time_rolls_to_next_hour() {
        assert_eq!(next_fire_time(&utc(10, 5, 0), 5), utc(11, 5, 0));
        assert_eq!(next_fire_time(&utc(10, 59, 59), 0), utc(11, 0, 0));
        assert_eq!(next_fire_time(&utc(23, 30, 0), 5), Utc.with_ymd_and_hms(2024, 3, 3, 0, 5, 0).unwrap());
    }

    #[test]
    fn test_next_fire_time_half_hour_zone() {
        // Kolkata is UTC+05:30, so local minute 5 is not UTC minute 5
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 2, 10, 2, 0).unwrap();
        let next = next_fire_time(&now, 5);
        assert_eq!((next.hour(), next.minute()), (10, 5));
    }

    #[test]
    fn test_next_minute_and_until() {
        assert_eq!(next_minute(&utc(10, 2, 30)), utc(10, 3, 0));
        assert_eq!(until(&utc(10, 2, 30), &utc(10, 3, 0)), Duration::from_secs(30));
        assert_eq!(until(&utc(10, 3, 0), &utc(10, 2, 30)), Duration::ZERO);
    }
}
