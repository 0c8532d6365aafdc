use crate::constants::{
    default_threshold, DEFAULT_ALERT_MINUTE, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_COLLECT_MINUTE,
    DEFAULT_PERPLEXITY_MODEL, DEFAULT_SMTP_HOST, DEFAULT_SOURCE_DELAY_MS,
    DEFAULT_TRACKED_INDICATORS,
};
use crate::error::{AppError, Result};
use crate::models::{parse_tracked_indicators, TrackedIndicator};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// SMTP settings for alert and digest emails
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub recipients: Vec<String>,
}

/// Environment variables holding bond prompts, with the label each source logs under
///
/// `PROMPT_BONDS` asks for every yield at once; the gilt and treasury prompts
/// split the same keys across two requests whose answers are stored together.
const BOND_PROMPTS: &[(&str, &str)] = &[
    ("PROMPT_BONDS", "bonds"),
    ("PROMPT_UK_GILTS", "uk_gilts"),
    ("PROMPT_US_TREASURY", "us_treasury"),
];

/// Settings for one Perplexity bond-yield prompt
#[derive(Debug, Clone)]
pub struct PerplexityConfig {
    pub label: String,
    pub api_key: String,
    pub prompt: String,
    pub model: String,
}

/// Application configuration read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite file holding `time_series` and `parameters`
    pub database_path: PathBuf,

    /// HTTP port for the dashboard and editor
    pub port: u16,

    /// Timezone that defines monitoring windows and calendar days
    pub timezone: Tz,

    /// Indicators evaluated for alerts, each with its threshold
    pub indicators: Vec<TrackedIndicator>,

    /// Minute past the hour for alert ticks
    pub alert_minute: u32,

    /// Minute past the hour for price collection
    pub collect_minute: u32,

    /// Deadline for each database, HTTP or SMTP call
    pub call_timeout: Duration,

    /// Pause between price sources
    pub source_delay: Duration,

    pub smtp: Option<SmtpConfig>,
    /// One entry per configured bond prompt; empty disables bond collection
    pub perplexity: Vec<PerplexityConfig>,
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let database_path = PathBuf::from(get("DATABASE_PATH").unwrap_or_else(|| "pricewatch.db".to_string()));
        let port = parse_or_default(&get, "PORT", 3000u16);

        let timezone = match get("APP_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| AppError::Config(format!("Invalid APP_TIMEZONE '{}': {}", name, e)))?,
            None => Tz::UTC,
        };

        let global_threshold = get("ALERT_THRESHOLD_PCT").and_then(|s| parse_threshold("ALERT_THRESHOLD_PCT", &s));
        let indicators_spec = get("TRACKED_INDICATORS").unwrap_or_else(|| DEFAULT_TRACKED_INDICATORS.to_string());
        let indicators = parse_tracked_indicators(&indicators_spec, |indicator_type| {
            let var = format!("THRESHOLD_{}", indicator_type.to_uppercase());
            get(&var)
                .and_then(|s| parse_threshold(&var, &s))
                .or(global_threshold)
                .unwrap_or_else(|| default_threshold(indicator_type))
        })
        .map_err(|e| AppError::Config(format!("TRACKED_INDICATORS: {}", e)))?;

        let alert_minute = parse_minute(&get, "ALERT_MINUTE", DEFAULT_ALERT_MINUTE);
        let collect_minute = parse_minute(&get, "COLLECT_MINUTE", DEFAULT_COLLECT_MINUTE);
        let call_timeout = Duration::from_secs(parse_or_default(&get, "CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS).max(1));
        let source_delay = Duration::from_millis(parse_or_default(&get, "SOURCE_DELAY_MS", DEFAULT_SOURCE_DELAY_MS));

        let smtp = load_smtp(&get)?;

        let perplexity = load_perplexity(&get);

        Ok(Self {
            database_path,
            port,
            timezone,
            indicators,
            alert_minute,
            collect_minute,
            call_timeout,
            source_delay,
            smtp,
            perplexity,
        })
    }

    /// SMTP settings, or a configuration error naming what is missing
    pub fn require_smtp(&self) -> Result<&SmtpConfig> {
        self.smtp.as_ref().ok_or_else(|| {
            AppError::Config(
                "SMTP is not configured: set SMTP_USER (or GMAIL_USER), SMTP_PASSWORD (or GMAIL_PASS) and EMAIL_RECIPIENTS".to_string(),
            )
        })
    }
}

fn load_smtp<G>(get: &G) -> Result<Option<SmtpConfig>>
where
    G: Fn(&str) -> Option<String>,
{
    let username = get("SMTP_USER").or_else(|| get("GMAIL_USER"));
    let password = get("SMTP_PASSWORD").or_else(|| get("GMAIL_PASS"));
    let recipients: Vec<String> = get("EMAIL_RECIPIENTS")
        .map(|s| {
            s.split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    match (username, password) {
        (None, None) if recipients.is_empty() => Ok(None),
        (Some(username), Some(password)) if !recipients.is_empty() => Ok(Some(SmtpConfig {
            host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            from: get("SMTP_FROM").unwrap_or_else(|| username.clone()),
            username,
            password,
            recipients,
        })),
        _ => Err(AppError::Config(
            "Incomplete SMTP configuration: SMTP_USER, SMTP_PASSWORD and EMAIL_RECIPIENTS must all be set".to_string(),
        )),
    }
}

fn load_perplexity<G>(get: &G) -> Vec<PerplexityConfig>
where
    G: Fn(&str) -> Option<String>,
{
    let prompts: Vec<(&str, String)> = BOND_PROMPTS
        .iter()
        .filter_map(|(var, label)| get(var).map(|prompt| (*label, prompt)))
        .collect();

    let Some(api_key) = get("PERPLEXITY_KEY") else {
        if !prompts.is_empty() {
            warn!("Bond prompts are set but PERPLEXITY_KEY is not; bond yields will not be collected");
        }
        return Vec::new();
    };
    if prompts.is_empty() {
        warn!("PERPLEXITY_KEY is set but no bond prompt is; bond yields will not be collected");
    }

    let model = get("PERPLEXITY_MODEL").unwrap_or_else(|| DEFAULT_PERPLEXITY_MODEL.to_string());
    prompts
        .into_iter()
        .map(|(label, prompt)| PerplexityConfig {
            label: label.to_string(),
            api_key: api_key.clone(),
            prompt,
            model: model.clone(),
        })
        .collect()
}

fn parse_or_default<G, T>(get: &G, name: &str, default: T) -> T
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match get(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

fn parse_minute<G>(get: &G, name: &str, default: u32) -> u32
where
    G: Fn(&str) -> Option<String>,
{
    let minute = parse_or_default(get, name, default);
    if minute < 60 {
        minute
    } else {
        warn!(variable = name, minute, default, "Minute out of range, using default");
        default
    }
}

fn parse_threshold(name: &str, raw: &str) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(pct) if pct.is_finite() && pct > 0.0 => Some(pct),
        _ => {
            warn!(variable = name, value = %raw, "Invalid threshold, ignoring");
            None
        }
    }
}
