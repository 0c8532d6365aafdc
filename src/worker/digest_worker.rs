use crate::constants::PARAM_DAILY_EMAIL_TIME;
use crate::error::{with_timeout, Result};
use crate::models::{TimeOfDay, TrackedIndicator};
use crate::services::digest::{collect_entries, digest_message};
use crate::services::monitoring_hours::daily_email_time;
use crate::services::{local_now, SharedHealthStats, SharedNotifier, SharedParameterStore, SharedTimeSeriesStore};
use crate::worker::schedule::{next_minute, until};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Everything the digest needs besides the clock
pub struct DigestContext {
    pub series: SharedTimeSeriesStore,
    pub parameters: SharedParameterStore,
    pub notifier: SharedNotifier,
    pub recipients: Vec<String>,
    pub indicators: Vec<TrackedIndicator>,
    pub call_timeout: Duration,
}

/// Check once a minute whether the daily summary is due
#[instrument(skip(context, health_stats))]
pub async fn run(context: DigestContext, health_stats: SharedHealthStats, timezone: Tz) {
    info!(timezone = %timezone, "Starting digest worker");

    let mut last_sent = initial_last_sent(&context, local_now(timezone)).await;

    loop {
        let now = local_now(timezone);
        sleep(until(&now, &next_minute(&now))).await;

        let now = local_now(timezone);
        match run_once(&context, now, &mut last_sent).await {
            Ok(true) => {
                health_stats.write().await.digest_last_sent = Some(Utc::now().to_rfc3339());
            }
            Ok(false) => {}
            Err(e) => error!(error = %e, "Digest worker: Failed to send daily summary"),
        }
    }
}

async fn scheduled_time(context: &DigestContext) -> Result<Option<TimeOfDay>> {
    let names: HashSet<&str> = [PARAM_DAILY_EMAIL_TIME].into_iter().collect();
    let params = with_timeout("read digest parameter", context.call_timeout, context.parameters.get_parameters(&names)).await?;
    Ok(daily_email_time(&params))
}

/// Treat today's summary as sent when the worker starts after its time
///
/// A restart late in the day does not send a second summary.
pub async fn initial_last_sent(context: &DigestContext, now: DateTime<Tz>) -> Option<NaiveDate> {
    match scheduled_time(context).await {
        Ok(Some(scheduled)) if TimeOfDay::of(&now) > scheduled => {
            info!(scheduled = %scheduled, "Started after the daily summary time, next summary tomorrow");
            Some(now.date_naive())
        }
        Ok(_) => None,
        Err(e) => {
            error!(error = %e, "Digest worker: Failed to read the daily summary time");
            None
        }
    }
}

/// Send the summary once the configured minute has been reached and today's has not gone out
///
/// Returns whether a message was sent. A pass that overruns the scheduled
/// minute still sends on the next check. `last_sent` is set to today as soon
/// as the summary is due, so a failed send is not retried that day.
pub async fn run_once(context: &DigestContext, now: DateTime<Tz>, last_sent: &mut Option<NaiveDate>) -> Result<bool> {
    let today = now.date_naive();
    if !is_due(scheduled_time(context).await?, TimeOfDay::of(&now), today, *last_sent) {
        return Ok(false);
    }
    *last_sent = Some(today);

    let entries = collect_entries(&context.series, &context.indicators, today, context.call_timeout).await?;
    let (subject, body) = digest_message(&entries, today);
    with_timeout(
        "send daily summary",
        context.call_timeout,
        context.notifier.send(&context.recipients, &subject, &body),
    )
    .await?;

    info!(indicators = entries.len(), "Daily summary sent");
    Ok(true)
}

fn is_due(scheduled: Option<TimeOfDay>, now: TimeOfDay, today: NaiveDate, last_sent: Option<NaiveDate>) -> bool {
    scheduled.is_some_and(|at| now >= at) && last_sent != Some(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::{MemoryStore, RecordingNotifier};
    use crate::services::ParameterStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn context(store: Arc<MemoryStore>, notifier: Arc<RecordingNotifier>) -> DigestContext {
        DigestContext {
            series: store.clone(),
            parameters: store,
            notifier,
            recipients: vec!["me@example.com".to_string()],
            indicators: vec![TrackedIndicator::new("gold", "USA", 0.1)],
            call_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_is_due() {
        let at = |s: &str| TimeOfDay::parse(s).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(is_due(Some(at("18:00")), at("18:00"), today, None));
        assert!(is_due(Some(at("18:00")), at("18:00"), today, Some(yesterday)));
        assert!(!is_due(Some(at("18:00")), at("18:00"), today, Some(today)));
        assert!(is_due(Some(at("18:00")), at("18:01"), today, None));
        assert!(!is_due(Some(at("18:00")), at("17:59"), today, None));
        assert!(!is_due(None, at("18:00"), today, None));
    }

    #[tokio::test]
    async fn test_sends_at_configured_minute() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        store.set_parameter("daily_email_time", "18:00").await.unwrap();
        let ctx = context(store, notifier.clone());

        let mut last_sent = None;
        let early = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 17, 59, 0).unwrap();
        assert!(!run_once(&ctx, early, &mut last_sent).await.unwrap());
        assert_eq!(last_sent, None);

        let due = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 18, 0, 0).unwrap();
        assert!(run_once(&ctx, due, &mut last_sent).await.unwrap());
        assert_eq!(last_sent, Some(due.date_naive()));
        assert!(!run_once(&ctx, due, &mut last_sent).await.unwrap());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Daily Price Summary - 2024-03-02");
        assert!(sent[0].1.contains("Gold: no data"));
    }

    #[tokio::test]
    async fn test_no_parameter_means_no_digest() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = context(store, notifier.clone());

        let now = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 18, 0, 0).unwrap();
        assert!(!run_once(&ctx, now, &mut None).await.unwrap());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_overrun_minute_still_sends() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        store.set_parameter("daily_email_time", "18:00").await.unwrap();
        let ctx = context(store, notifier.clone());

        // The 18:00 check never ran; the next pass lands two minutes late
        let late = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 18, 2, 0).unwrap();
        assert!(run_once(&ctx, late, &mut None).await.unwrap());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_waits_for_tomorrow() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        store.set_parameter("daily_email_time", "18:00").await.unwrap();
        notifier.set_failing(true);
        let ctx = context(store, notifier.clone());

        let mut last_sent = None;
        let due = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 18, 0, 0).unwrap();
        assert!(run_once(&ctx, due, &mut last_sent).await.is_err());

        notifier.set_failing(false);
        let later = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 18, 1, 0).unwrap();
        assert!(!run_once(&ctx, later, &mut last_sent).await.unwrap());

        let tomorrow = Tz::UTC.with_ymd_and_hms(2024, 3, 3, 18, 0, 0).unwrap();
        assert!(run_once(&ctx, tomorrow, &mut last_sent).await.unwrap());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_start_after_summary_time_waits_for_tomorrow() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        store.set_parameter("daily_email_time", "18:00").await.unwrap();
        let ctx = context(store, notifier);

        let before = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 17, 30, 0).unwrap();
        assert_eq!(initial_last_sent(&ctx, before).await, None);

        let after = Tz::UTC.with_ymd_and_hms(2024, 3, 2, 20, 0, 0).unwrap();
        let mut last_sent = initial_last_sent(&ctx, after).await;
        assert_eq!(last_sent, Some(after.date_naive()));
        assert!(!run_once(&ctx, after, &mut last_sent).await.unwrap());
    }
}
