use crate::commands::{build_sampler, open_store};
use crate::error::Result;
use crate::models::AppConfig;
use crate::server::{self, AppState};
use crate::services::{new_shared_health_stats, AlertEvaluator, SharedNotifier, SmtpNotifier};
use crate::worker::{self, DigestContext};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub async fn run(port: Option<u16>) -> Result<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    let smtp = config.require_smtp()?.clone();

    println!("🚀 Starting pricewatch server on port {}", config.port);
    println!("📁 Database: {}", config.database_path.display());
    println!("🕐 Timezone: {}", config.timezone);
    for indicator in &config.indicators {
        println!("🔔 Tracking {} (threshold {}%)", indicator, indicator.threshold_pct);
    }

    let store = open_store(&config).await?;
    let notifier: SharedNotifier = Arc::new(SmtpNotifier::new(&smtp)?);

    let evaluator = Arc::new(AlertEvaluator::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        smtp.recipients.clone(),
        config.indicators.clone(),
        config.timezone,
        config.call_timeout,
    ));
    let sampler = Arc::new(build_sampler(&config, store.clone())?);
    let health_stats = new_shared_health_stats(config.timezone.name());

    // Initial collection, including bond yields, without delaying startup
    let initial_sampler = sampler.clone();
    tokio::spawn(async move {
        match initial_sampler.collect(true).await {
            Ok(stored) => info!(stored, "Initial collection completed"),
            Err(e) => warn!(error = %e, "Initial collection failed"),
        }
    });

    println!("🔄 Starting background workers...");
    tokio::spawn(worker::run_alert_worker(
        evaluator.clone(),
        health_stats.clone(),
        config.timezone,
        config.alert_minute,
    ));
    tokio::spawn(worker::run_collector_worker(
        sampler,
        store.clone(),
        health_stats.clone(),
        config.timezone,
        config.collect_minute,
        config.call_timeout,
    ));
    tokio::spawn(worker::run_digest_worker(
        DigestContext {
            series: store.clone(),
            parameters: store.clone(),
            notifier,
            recipients: smtp.recipients.clone(),
            indicators: config.indicators.clone(),
            call_timeout: config.call_timeout,
        },
        health_stats.clone(),
        config.timezone,
    ));

    let app_state = AppState {
        series: store.clone(),
        parameters: store.clone(),
        evaluator,
        health_stats,
        timezone: config.timezone,
        call_timeout: config.call_timeout,
        started_at: Instant::now(),
    };

    server::serve(app_state, config.port, shutdown_signal()).await?;

    store.close().await;
    println!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, gracefully stopping");
}
