use crate::services::{local_now, AlertEvaluator, SharedHealthStats, TickOutcome, TickReport};
use crate::worker::schedule::{next_fire_time, until};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Evaluate alerts every hour at `minute` past, in the evaluator's timezone
#[instrument(skip(evaluator, health_stats))]
pub async fn run(evaluator: Arc<AlertEvaluator>, health_stats: SharedHealthStats, timezone: Tz, minute: u32) {
    info!(
        indicators = evaluator.indicators().len(),
        minute,
        timezone = %timezone,
        "Starting alert worker"
    );

    let mut iteration_count = 0u64;

    loop {
        let now = local_now(timezone);
        let next = next_fire_time(&now, minute);
        info!(next_tick = %next.format("%Y-%m-%d %H:%M %Z"), "Alert worker: Waiting for next tick");
        sleep(until(&now, &next)).await;

        iteration_count += 1;
        run_once(&evaluator, &health_stats, local_now(timezone), iteration_count).await;
    }
}

/// One tick: evaluate, log each indicator's outcome and update health stats
pub async fn run_once(
    evaluator: &AlertEvaluator,
    health_stats: &SharedHealthStats,
    now: DateTime<Tz>,
    iteration: u64,
) {
    let loop_start = std::time::Instant::now();
    info!(iteration, "Alert worker: Starting tick");

    let reports = match evaluator.run_tick(now).await {
        Ok(reports) => reports,
        Err(e) => {
            error!(iteration, error = %e, "Alert worker: Could not read monitoring window");
            let mut health = health_stats.write().await;
            health.alert_last_run = Some(Utc::now().to_rfc3339());
            health.alert_iteration_count = iteration;
            health.alert_errors += 1;
            return;
        }
    };

    let mut sent = 0u64;
    let mut errors = 0u64;
    for report in &reports {
        log_report(iteration, report);
        match &report.result {
            Ok(TickOutcome::Alerted { .. }) => sent += 1,
            Err(_) => errors += 1,
            Ok(_) => {}
        }
    }

    let in_window = reports
        .iter()
        .any(|r| !matches!(r.result, Ok(TickOutcome::OutsideWindow)));

    {
        let mut health = health_stats.write().await;
        health.alert_last_run = Some(Utc::now().to_rfc3339());
        health.alert_iteration_count = iteration;
        health.alerts_sent += sent;
        health.alert_errors += errors;
        health.is_monitoring_hours = in_window;
    }

    info!(
        iteration,
        alerts_sent = sent,
        errors,
        loop_duration_secs = loop_start.elapsed().as_secs_f64(),
        "Alert worker: Tick completed"
    );
}

fn log_report(iteration: u64, report: &TickReport) {
    let indicator = report.indicator_type.as_str();
    match &report.result {
        Ok(TickOutcome::Alerted { percent_change, .. }) => {
            info!(iteration, indicator, change_pct = %format!("{:.2}", percent_change), "Alert sent")
        }
        Ok(TickOutcome::BelowThreshold { percent_change, .. }) => {
            info!(iteration, indicator, change_pct = %format!("{:.2}", percent_change), "Below threshold")
        }
        Ok(TickOutcome::OutsideWindow) => {}
        Ok(outcome) => info!(iteration, indicator, outcome = ?outcome, "Skipped"),
        Err(e) => warn!(iteration, indicator, error = %e, "Evaluation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSample, TrackedIndicator};
    use crate::services::fakes::{MemoryStore, RecordingNotifier};
    use crate::services::{new_shared_health_stats, TimeSeriesStore};
    use chrono::TimeZone;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_once_updates_health() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let evaluator = AlertEvaluator::new(
            store.clone(),
            store.clone(),
            notifier.clone(),
            vec!["me@example.com".to_string()],
            vec![
                TrackedIndicator::new("gold", "USA", 0.1),
                TrackedIndicator::new("bitcoin", "USA", 2.0),
            ],
            Tz::UTC,
            Duration::from_secs(5),
        );

        for (d, v) in [(1, 100.0), (2, 101.0)] {
            let ts = Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap();
            store.insert(NewSample::new("gold", "USA", v).at(ts)).await.unwrap();
        }

        let health = new_shared_health_stats("UTC");
        let now = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 10, 5, 0).unwrap();
        run_once(&evaluator, &health, now, 1).await;

        let stats = health.read().await;
        assert_eq!(stats.alert_iteration_count, 1);
        assert_eq!(stats.alerts_sent, 1);
        assert_eq!(stats.alert_errors, 0);
        assert!(stats.is_monitoring_hours);
        assert!(stats.alert_last_run.is_some());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_outside_window() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = AlertEvaluator::new(
            store.clone(),
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            Vec::new(),
            vec![TrackedIndicator::new("gold", "USA", 0.1)],
            Tz::UTC,
            Duration::from_secs(5),
        );

        let health = new_shared_health_stats("UTC");
        let now = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 22, 5, 0).unwrap();
        run_once(&evaluator, &health, now, 3).await;

        let stats = health.read().await;
        assert_eq!(stats.alert_iteration_count, 3);
        assert!(!stats.is_monitoring_hours);
        assert_eq!(store.series_reads(), 0);
    }
}
