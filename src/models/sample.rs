use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped price observation for an indicator
///
/// Stored in the `time_series` table. Values carry two decimals, matching the
/// `NUMERIC(10, 2)` precision of the price columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Row id
    pub id: i64,

    /// Observation time (UTC, whole seconds)
    pub timestamp: DateTime<Utc>,

    /// Indicator type, e.g. "gold", "bitcoin", "gilt_10y"
    pub indicator_type: String,

    /// Indicator country, e.g. "USA", "UK"
    pub indicator_country: String,

    /// Observed value (price or yield)
    pub value: f64,
}

/// A sample that has not been stored yet
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewSample {
    pub indicator_type: String,
    pub indicator_country: String,
    pub value: f64,
    /// Defaults to "now" when omitted
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewSample {
    pub fn new(indicator_type: &str, indicator_country: &str, value: f64) -> Self {
        Self {
            indicator_type: indicator_type.to_string(),
            indicator_country: indicator_country.to_string(),
            value,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check fields before the row reaches the database
    pub fn validate(&self) -> Result<(), String> {
        if self.indicator_type.trim().is_empty() {
            return Err("indicator_type must not be empty".to_string());
        }
        if self.indicator_country.trim().is_empty() {
            return Err("indicator_country must not be empty".to_string());
        }
        if !self.value.is_finite() {
            return Err(format!("value must be a finite number, got {}", self.value));
        }
        Ok(())
    }
}

/// Partial update applied by the editor; `None` fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleUpdate {
    pub indicator_type: Option<String>,
    pub indicator_country: Option<String>,
    pub value: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SampleUpdate {
    pub fn apply(&self, sample: &mut Sample) {
        if let Some(indicator_type) = &self.indicator_type {
            sample.indicator_type = indicator_type.clone();
        }
        if let Some(indicator_country) = &self.indicator_country {
            sample.indicator_country = indicator_country.clone();
        }
        if let Some(value) = self.value {
            sample.value = round_value(value);
        }
        if let Some(timestamp) = self.timestamp {
            sample.timestamp = normalize_timestamp(timestamp);
        }
    }
}

/// Round a value to the two decimals the table keeps
pub fn round_value(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Drop sub-second precision so stored timestamps share one text format
pub fn normalize_timestamp(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(0)
}
