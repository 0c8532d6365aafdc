use crate::error::Result;
use crate::models::{NewSample, Parameter, Sample, SampleUpdate};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Append-only store of indicator samples
///
/// Calendar days are interpreted in the store's configured timezone.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Append a sample and return it with its id
    async fn insert(&self, sample: NewSample) -> Result<Sample>;

    /// Most recent sample of an indicator type
    async fn latest(&self, indicator_type: &str) -> Result<Option<Sample>>;

    /// Last sample of an indicator type on the given day
    async fn last_on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Option<Sample>>;

    /// First sample of an indicator type on the given day
    async fn first_on_day(&self, indicator_type: &str, day: NaiveDate) -> Result<Option<Sample>>;

    /// Most recent samples, newest first, optionally restricted to one type
    async fn recent(&self, indicator_type: Option<&str>, limit: i64) -> Result<Vec<Sample>>;

    async fn get(&self, id: i64) -> Result<Option<Sample>>;

    /// Apply an editor update; `None` when the row does not exist
    async fn update(&self, id: i64, update: SampleUpdate) -> Result<Option<Sample>>;

    /// Delete a row; false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Key/value settings store
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Values for the requested names; missing names are absent from the map
    async fn get_parameters(&self, names: &HashSet<&str>) -> Result<HashMap<String, String>>;

    async fn all_parameters(&self) -> Result<Vec<Parameter>>;

    /// Insert or replace a parameter value
    async fn set_parameter(&self, name: &str, value: &str) -> Result<Parameter>;
}

pub type SharedTimeSeriesStore = Arc<dyn TimeSeriesStore>;
pub type SharedParameterStore = Arc<dyn ParameterStore>;
