use crate::constants::{PARAM_END_TIME, PARAM_START_TIME};
use crate::error::{with_timeout, Result};
use crate::services::{local_now, MonitoringWindow, PriceSampler, SharedHealthStats, SharedParameterStore};
use crate::worker::schedule::{next_fire_time, until};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Collect prices every hour at `minute` past, within the monitoring hours
#[instrument(skip(sampler, parameters, health_stats))]
pub async fn run(
    sampler: Arc<PriceSampler>,
    parameters: SharedParameterStore,
    health_stats: SharedHealthStats,
    timezone: Tz,
    minute: u32,
    call_timeout: Duration,
) {
    info!(minute, timezone = %timezone, "Starting collector worker");

    let mut iteration_count = 0u64;

    loop {
        let now = local_now(timezone);
        let next = next_fire_time(&now, minute);
        sleep(until(&now, &next)).await;

        iteration_count += 1;
        match run_once(&sampler, &parameters, local_now(timezone), call_timeout).await {
            Ok(Some(stored)) => {
                info!(iteration = iteration_count, stored, "Collector worker: Collection completed");
                let mut health = health_stats.write().await;
                health.collect_last_run = Some(Utc::now().to_rfc3339());
                health.collect_iteration_count = iteration_count;
                health.samples_collected += stored as u64;
            }
            Ok(None) => {
                info!(iteration = iteration_count, "Collector worker: Outside monitoring hours, skipping");
                health_stats.write().await.collect_iteration_count = iteration_count;
            }
            Err(e) => {
                error!(iteration = iteration_count, error = %e, "Collector worker: Collection failed");
            }
        }
    }
}

/// Collect once if the current hour is in the window; `None` when skipped
pub async fn run_once(
    sampler: &PriceSampler,
    parameters: &SharedParameterStore,
    now: DateTime<Tz>,
    call_timeout: Duration,
) -> Result<Option<usize>> {
    let names: HashSet<&str> = [PARAM_START_TIME, PARAM_END_TIME].into_iter().collect();
    let params = with_timeout("read monitoring parameters", call_timeout, parameters.get_parameters(&names)).await?;
    let window = MonitoringWindow::from_parameters(&params);

    if !window.contains_hour(now.hour()) {
        return Ok(None);
    }

    sampler.collect(false).await.map(Some)
}
