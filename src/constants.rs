//! Shared constants
//!
//! Table and parameter names, schedule defaults and per-indicator alert
//! thresholds.

/// Parameter holding the start of the monitoring window (HH:MM)
pub const PARAM_START_TIME: &str = "start_time";

/// Parameter holding the end of the monitoring window (HH:MM)
pub const PARAM_END_TIME: &str = "end_time";

/// Optional parameter holding the time of the daily summary email (HH:MM)
pub const PARAM_DAILY_EMAIL_TIME: &str = "daily_email_time";

/// Parameters whose values must be valid HH:MM strings
pub const TIME_PARAMETERS: &[&str] = &[PARAM_START_TIME, PARAM_END_TIME, PARAM_DAILY_EMAIL_TIME];

pub const DEFAULT_START_TIME: &str = "08:00";
pub const DEFAULT_END_TIME: &str = "17:00";

/// Indicators evaluated for alerts when `TRACKED_INDICATORS` is unset
pub const DEFAULT_TRACKED_INDICATORS: &str = "gold:USA,bitcoin:USA";

/// Per-indicator default alert thresholds (percent)
pub const DEFAULT_THRESHOLDS: &[(&str, f64)] = &[
    ("gold", 0.10),
    ("bitcoin", 2.0),
];

/// Threshold for indicators without a specific default (percent)
pub const FALLBACK_THRESHOLD_PCT: f64 = 0.5;

/// Alert worker fires at this minute past every hour
pub const DEFAULT_ALERT_MINUTE: u32 = 5;

/// Collector worker fires at this minute past every hour
pub const DEFAULT_COLLECT_MINUTE: u32 = 0;

/// Upper bound for any single database, HTTP or SMTP call
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Pause between consecutive price sources
pub const DEFAULT_SOURCE_DELAY_MS: u64 = 2000;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_PERPLEXITY_MODEL: &str = "sonar";

/// Recent-sample listing defaults for the editor API
pub const DEFAULT_SAMPLE_LIMIT: i64 = 100;
pub const MAX_SAMPLE_LIMIT: i64 = 1000;

/// Look up the default threshold for an indicator type
pub fn default_threshold(indicator_type: &str) -> f64 {
    DEFAULT_THRESHOLDS
        .iter()
        .find(|(name, _)| *name == indicator_type)
        .map(|(_, pct)| *pct)
        .unwrap_or(FALLBACK_THRESHOLD_PCT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold() {
        assert_eq!(default_threshold("gold"), 0.10);
        assert_eq!(default_threshold("bitcoin"), 2.0);
        assert_eq!(default_threshold("gilt_10y"), FALLBACK_THRESHOLD_PCT);
    }
}
