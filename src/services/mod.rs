pub mod alert_evaluator;
pub mod database;
pub mod digest;
pub mod health;
pub mod monitoring_hours;
pub mod notifier;
pub mod price_sources;
pub mod sampler;
pub mod store;

#[cfg(test)]
pub(crate) mod fakes;

pub use alert_evaluator::{AlertEvaluator, ReferenceKind, TickOutcome, TickReport};
pub use database::{IndicatorStats, SQLiteDatabaseStore};
pub use health::{new_shared_health_stats, HealthStats, SharedHealthStats};
pub use monitoring_hours::{day_bounds_utc, local_now, MonitoringWindow};
pub use notifier::{LogNotifier, Notifier, SharedNotifier, SmtpNotifier};
pub use price_sources::{PerplexitySource, PriceSource, Quote, SwissquoteSource};
pub use sampler::PriceSampler;
pub use store::{ParameterStore, SharedParameterStore, SharedTimeSeriesStore, TimeSeriesStore};
