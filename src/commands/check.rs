use crate::commands::open_store;
use crate::error::Result;
use crate::models::AppConfig;
use crate::services::{local_now, AlertEvaluator, LogNotifier, SharedNotifier, SmtpNotifier, TickOutcome};

/// Run a single alert tick now and print what happened
///
/// State starts empty, so every indicator compares against the previous close.
pub async fn run(dry_run: bool) -> Result<()> {
    let config = AppConfig::from_env()?;

    let (notifier, recipients): (SharedNotifier, Vec<String>) = if dry_run {
        let recipients = config.smtp.as_ref().map(|s| s.recipients.clone()).unwrap_or_default();
        (std::sync::Arc::new(LogNotifier), recipients)
    } else {
        let smtp = config.require_smtp()?;
        (std::sync::Arc::new(SmtpNotifier::new(smtp)?), smtp.recipients.clone())
    };

    let store = open_store(&config).await?;
    let evaluator = AlertEvaluator::new(
        store.clone(),
        store.clone(),
        notifier,
        recipients,
        config.indicators.clone(),
        config.timezone,
        config.call_timeout,
    );

    let now = local_now(config.timezone);
    println!("🔍 Checking prices at {}{}\n", now.format("%Y-%m-%d %H:%M %Z"), if dry_run { " (dry run)" } else { "" });

    let reports = evaluator.run_tick(now).await;
    store.close().await;

    for report in reports? {
        let line = match report.result {
            Ok(TickOutcome::OutsideWindow) => "outside monitoring hours".to_string(),
            Ok(TickOutcome::NoComparisonPrice) => "no comparison price".to_string(),
            Ok(TickOutcome::NoCurrentPrice) => "no current price".to_string(),
            Ok(TickOutcome::ZeroComparisonPrice) => "comparison price is zero".to_string(),
            Ok(TickOutcome::BelowThreshold { current_price, comparison_price, percent_change }) => format!(
                "{:.2} vs {:.2} ({:+.2}%), below threshold",
                current_price, comparison_price, percent_change
            ),
            Ok(TickOutcome::Alerted { current_price, comparison_price, percent_change, reference }) => format!(
                "{:.2} vs {} {:.2} ({:+.2}%), alert sent",
                current_price, reference, comparison_price, percent_change
            ),
            Err(e) => format!("failed: {}", e),
        };
        println!("   {:<14} {}", report.indicator_type, line);
    }

    Ok(())
}
