use crate::error::{with_timeout, Result};
use crate::models::NewSample;
use crate::services::price_sources::PriceSource;
use crate::services::store::SharedTimeSeriesStore;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Pulls current prices from every configured source into the time series
pub struct PriceSampler {
    series: SharedTimeSeriesStore,
    sources: Vec<Box<dyn PriceSource>>,
    /// Only fetched on explicit request, e.g. at startup
    bond_sources: Vec<Box<dyn PriceSource>>,
    source_delay: Duration,
    call_timeout: Duration,
}

impl PriceSampler {
    pub fn new(series: SharedTimeSeriesStore, source_delay: Duration, call_timeout: Duration) -> Self {
        Self {
            series,
            sources: Vec::new(),
            bond_sources: Vec::new(),
            source_delay,
            call_timeout,
        }
    }

    pub fn with_source(mut self, source: Box<dyn PriceSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_bond_source(mut self, source: Box<dyn PriceSource>) -> Self {
        self.bond_sources.push(source);
        self
    }

    pub fn has_bond_sources(&self) -> bool {
        !self.bond_sources.is_empty()
    }

    /// Fetch and store one round of quotes, returning how many samples were stored
    ///
    /// A failing source is logged and skipped; the others still run.
    #[instrument(skip(self))]
    pub async fn collect(&self, include_bonds: bool) -> Result<usize> {
        let bonds: &[Box<dyn PriceSource>] = if include_bonds { &self.bond_sources } else { &[] };
        let mut stored = 0usize;

        for (index, source) in self.sources.iter().chain(bonds.iter()).enumerate() {
            if index > 0 && !self.source_delay.is_zero() {
                tokio::time::sleep(self.source_delay).await;
            }

            let quotes = match with_timeout(source.name(), self.call_timeout, source.fetch()).await {
                Ok(quotes) => quotes,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Price source failed");
                    continue;
                }
            };

            for quote in quotes {
                if !quote.value.is_finite() {
                    warn!(source = source.name(), indicator = %quote.indicator_type, "Skipping non-finite value");
                    continue;
                }

                let sample = NewSample::new(&quote.indicator_type, &quote.indicator_country, quote.value);
                let saved = with_timeout("store sample", self.call_timeout, self.series.insert(sample)).await?;
                info!(
                    source = source.name(),
                    indicator = %saved.indicator_type,
                    country = %saved.indicator_country,
                    value = saved.value,
                    "Stored sample"
                );
                stored += 1;
            }
        }

        Ok(stored)
    }
}
