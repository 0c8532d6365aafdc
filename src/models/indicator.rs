use serde::Serialize;
use std::fmt;

/// An indicator the alert evaluator watches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedIndicator {
    /// Indicator type as stored in `time_series.indicator_type`
    pub indicator_type: String,

    /// Indicator country as stored in `time_series.indicator_country`
    pub indicator_country: String,

    /// Minimum absolute percent change that triggers an alert
    pub threshold_pct: f64,
}

impl TrackedIndicator {
    pub fn new(indicator_type: &str, indicator_country: &str, threshold_pct: f64) -> Self {
        Self {
            indicator_type: indicator_type.to_string(),
            indicator_country: indicator_country.to_string(),
            threshold_pct,
        }
    }

    /// Name used in alert subjects, e.g. "Gold"
    pub fn display_name(&self) -> String {
        let mut chars = self.indicator_type.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
            None => String::new(),
        }
    }
}

impl fmt::Display for TrackedIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.indicator_type, self.indicator_country)
    }
}

/// Parse a `type:country` list such as `gold:USA,bitcoin:USA`
///
/// Thresholds are resolved by `lookup_threshold` for each type.
pub fn parse_tracked_indicators<F>(s: &str, lookup_threshold: F) -> Result<Vec<TrackedIndicator>, String>
where
    F: Fn(&str) -> f64,
{
    let mut indicators: Vec<TrackedIndicator> = Vec::new();

    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (indicator_type, country) = part
            .split_once(':')
            .ok_or_else(|| format!("Invalid indicator '{}': expected type:country", part))?;

        let indicator_type = indicator_type.trim().to_lowercase();
        let country = country.trim().to_uppercase();
        if indicator_type.is_empty() || country.is_empty() {
            return Err(format!("Invalid indicator '{}': expected type:country", part));
        }

        if indicators.iter().any(|i| i.indicator_type == indicator_type) {
            return Err(format!("Indicator '{}' listed more than once", indicator_type));
        }

        let threshold = lookup_threshold(&indicator_type);
        indicators.push(TrackedIndicator::new(&indicator_type, &country, threshold));
    }

    if indicators.is_empty() {
        return Err("No tracked indicators configured".to_string());
    }

    Ok(indicators)
}
