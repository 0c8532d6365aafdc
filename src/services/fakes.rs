//! In-memory stand-ins for the stores and the notifier, used by unit tests.

use crate::error::{AppError, Result};
use crate::models::{normalize_timestamp, round_value, NewSample, Parameter, Sample, SampleUpdate};
use crate::services::monitoring_hours::day_bounds_utc;
use crate::services::notifier::Notifier;
use crate::services::store::{ParameterStore, TimeSeriesStore};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Time series and parameters kept in vectors; calendar days are UTC
#[derive(Default)]
pub struct MemoryStore {
    samples: Mutex<Vec<Sample>>,
    parameters: Mutex<Vec<Parameter>>,
    series_reads: AtomicUsize,
    parameter_reads: AtomicUsize,
    series_failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series_reads(&self) -> usize {
        self.series_reads.load(Ordering::SeqCst)
    }

    pub fn reset_series_reads(&self) {
        self.series_reads.store(0, Ordering::SeqCst);
    }

    pub fn parameter_reads(&self) -> usize {
        self.parameter_reads.load(Ordering::SeqCst)
    }

    /// Make every time-series read fail with a database error
    pub fn set_series_failing(&self, failing: bool) {
        self.series_failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    fn read(&self) -> Result<Vec<Sample>> {
        self.series_reads.fetch_add(1, Ordering::SeqCst);
        if self.series_failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("simulated failure".to_string()));
        }
        Ok(self.samples.lock().unwrap().clone())
    }

    fn on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Vec<Sample>> {
        let (start, end) = day_bounds_utc(day, Tz::UTC);
        let mut samples: Vec<Sample> = self
            .read()?
            .into_iter()
            .filter(|s| s.indicator_type == indicator_type && s.timestamp >= start && s.timestamp < end)
            .collect();
        samples.sort_by_key(|s| (s.timestamp, s.id));
        Ok(samples)
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn insert(&self, sample: NewSample) -> Result<Sample> {
        sample.validate().map_err(AppError::InvalidInput)?;
        let mut samples = self.samples.lock().unwrap();
        let stored = Sample {
            id: samples.len() as i64 + 1,
            timestamp: normalize_timestamp(sample.timestamp.unwrap_or_else(Utc::now)),
            indicator_type: sample.indicator_type,
            indicator_country: sample.indicator_country,
            value: round_value(sample.value),
        };
        samples.push(stored.clone());
        Ok(stored)
    }

    async fn latest(&self, indicator_type: &str) -> Result<Option<Sample>> {
        Ok(self
            .read()?
            .into_iter()
            .filter(|s| s.indicator_type == indicator_type)
            .max_by_key(|s| (s.timestamp, s.id)))
    }

    async fn last_on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Option<Sample>> {
        Ok(self.on_day(indicator_type, day)?.pop())
    }

    async fn first_on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Option<Sample>> {
        Ok(self.on_day(indicator_type, day)?.into_iter().next())
    }

    async fn recent(&self, indicator_type: Option<&str>, limit: i64) -> Result<Vec<Sample>> {
        let mut samples: Vec<Sample> = self
            .read()?
            .into_iter()
            .filter(|s| indicator_type.map_or(true, |t| s.indicator_type == t))
            .collect();
        samples.sort_by_key(|s| std::cmp::Reverse((s.timestamp, s.id)));
        samples.truncate(limit.max(0) as usize);
        Ok(samples)
    }

    async fn get(&self, id: i64) -> Result<Option<Sample>> {
        Ok(self.read()?.into_iter().find(|s| s.id == id))
    }

    async fn update(&self, id: i64, update: SampleUpdate) -> Result<Option<Sample>> {
        let mut samples = self.samples.lock().unwrap();
        match samples.iter_mut().find(|s| s.id == id) {
            Some(sample) => {
                let mut updated = sample.clone();
                update.apply(&mut updated);
                NewSample::new(&updated.indicator_type, &updated.indicator_country, updated.value)
                    .validate()
                    .map_err(AppError::InvalidInput)?;
                *sample = updated.clone();
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut samples = self.samples.lock().unwrap();
        let before = samples.len();
        samples.retain(|s| s.id != id);
        Ok(samples.len() != before)
    }
}

#[async_trait]
impl ParameterStore for MemoryStore {
    async fn get_parameters(&self, names: &HashSet<&str>) -> Result<HashMap<String, String>> {
        self.parameter_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .parameters
            .lock()
            .unwrap()
            .iter()
            .filter(|p| names.contains(p.name.as_str()))
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect())
    }

    async fn all_parameters(&self) -> Result<Vec<Parameter>> {
        Ok(self.parameters.lock().unwrap().clone())
    }

    async fn set_parameter(&self, name: &str, value: &str) -> Result<Parameter> {
        let mut parameters = self.parameters.lock().unwrap();
        if let Some(existing) = parameters.iter_mut().find(|p| p.name == name) {
            existing.value = value.to_string();
            return Ok(existing.clone());
        }
        let parameter = Parameter {
            id: parameters.len() as i64 + 1,
            name: name.to_string(),
            value: value.to_string(),
        };
        parameters.push(parameter.clone());
        Ok(parameter)
    }
}

/// Records every message; can be switched to fail or to respond slowly
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long inside every send
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// (subject, body) of every delivered message
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _recipients: &[String], subject: &str, body: &str) -> Result<()> {
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Notification("simulated SMTP failure".to_string()));
        }
        self.sent.lock().unwrap().push((subject.to_string(), body.to_string()));
        Ok(())
    }
}
