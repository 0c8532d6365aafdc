pub mod check;
pub mod collect;
pub mod serve;
pub mod status;

use crate::error::Result;
use crate::models::AppConfig;
use crate::services::{PerplexitySource, PriceSampler, SQLiteDatabaseStore, SharedTimeSeriesStore, SwissquoteSource};
use std::sync::Arc;
use tracing::info;

/// Open (and if needed create) the SQLite store named by the configuration
pub(crate) async fn open_store(config: &AppConfig) -> Result<Arc<SQLiteDatabaseStore>> {
    let store = SQLiteDatabaseStore::new(config.database_path.clone(), config.timezone).await?;
    Ok(Arc::new(store))
}

/// Swissquote gold and bitcoin, plus one Perplexity source per configured bond prompt
pub(crate) fn build_sampler(config: &AppConfig, series: SharedTimeSeriesStore) -> Result<PriceSampler> {
    let mut sampler = PriceSampler::new(series, config.source_delay, config.call_timeout);

    for source in SwissquoteSource::defaults(config.call_timeout)? {
        sampler = sampler.with_source(Box::new(source));
    }

    for perplexity in &config.perplexity {
        info!(prompt = %perplexity.label, model = %perplexity.model, "Bond yield collection enabled");
        sampler = sampler.with_bond_source(Box::new(PerplexitySource::new(perplexity.clone(), config.call_timeout)?));
    }

    Ok(sampler)
}
