//! Price-change alerting.
//!
//! Each tick compares the latest sample of every tracked indicator against a
//! reference price: the price of the last alert sent today, or the previous
//! day's closing sample when nothing was sent yet. When the absolute change
//! reaches the indicator's threshold an email goes out, and only after the send
//! succeeds does the alerted price become the new reference. The evaluator
//! therefore fires on cumulative drift away from the last notified price.

use crate::constants::{PARAM_END_TIME, PARAM_START_TIME};
use crate::error::{with_timeout, Result};
use crate::models::{AlertState, Sample, TimeOfDay, TrackedIndicator};
use crate::services::monitoring_hours::MonitoringWindow;
use crate::services::notifier::SharedNotifier;
use crate::services::store::{SharedParameterStore, SharedTimeSeriesStore};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Which price an evaluation compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferenceKind {
    LastAlertPrice,
    PreviousClose,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::LastAlertPrice => write!(f, "last alert price"),
            ReferenceKind::PreviousClose => write!(f, "previous day close"),
        }
    }
}

/// Result of evaluating one indicator on one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TickOutcome {
    /// Current time is outside the monitoring window
    OutsideWindow,
    /// No alert price today and no sample on the previous day
    NoComparisonPrice,
    /// No sample at all for the indicator
    NoCurrentPrice,
    /// Reference price is zero, so no percent change exists
    ZeroComparisonPrice,
    BelowThreshold {
        current_price: f64,
        comparison_price: f64,
        percent_change: f64,
    },
    Alerted {
        current_price: f64,
        comparison_price: f64,
        percent_change: f64,
        reference: ReferenceKind,
    },
}

/// Per-indicator entry of a tick
#[derive(Debug)]
pub struct TickReport {
    pub indicator_type: String,
    pub result: Result<TickOutcome>,
}

/// Percent change from `comparison` to `current`; `None` when undefined
pub fn percent_change(current: f64, comparison: f64) -> Option<f64> {
    if comparison == 0.0 {
        return None;
    }
    let change = (current - comparison) / comparison * 100.0;
    change.is_finite().then_some(change)
}

/// Decides when a price move is worth an email and remembers what was sent
pub struct AlertEvaluator {
    series: SharedTimeSeriesStore,
    parameters: SharedParameterStore,
    notifier: SharedNotifier,
    recipients: Vec<String>,
    indicators: Vec<TrackedIndicator>,
    /// One state per indicator type; the lock is held for a whole evaluation
    states: HashMap<String, Mutex<AlertState>>,
    timezone: Tz,
    call_timeout: Duration,
}

impl AlertEvaluator {
    pub fn new(
        series: SharedTimeSeriesStore,
        parameters: SharedParameterStore,
        notifier: SharedNotifier,
        recipients: Vec<String>,
        indicators: Vec<TrackedIndicator>,
        timezone: Tz,
        call_timeout: Duration,
    ) -> Self {
        let states = indicators
            .iter()
            .map(|i| (i.indicator_type.clone(), Mutex::new(AlertState::default())))
            .collect();

        Self {
            series,
            parameters,
            notifier,
            recipients,
            indicators,
            states,
            timezone,
            call_timeout,
        }
    }

    pub fn indicators(&self) -> &[TrackedIndicator] {
        &self.indicators
    }

    /// Evaluate every tracked indicator at `now`
    ///
    /// Fails only when the monitoring window cannot be read. Per-indicator
    /// failures are reported in the returned list and do not stop the others.
    pub async fn run_tick(&self, now: DateTime<Tz>) -> Result<Vec<TickReport>> {
        let names: HashSet<&str> = [PARAM_START_TIME, PARAM_END_TIME].into_iter().collect();
        let params = with_timeout("read monitoring parameters", self.call_timeout, self.parameters.get_parameters(&names)).await?;
        let window = MonitoringWindow::from_parameters(&params);
        let monitoring_time = TimeOfDay::of(&now);

        if !window.contains(monitoring_time) {
            info!(
                start = %window.start,
                end = %window.end,
                now = %monitoring_time,
                "Outside monitoring hours"
            );
            return Ok(self
                .indicators
                .iter()
                .map(|i| TickReport {
                    indicator_type: i.indicator_type.clone(),
                    result: Ok(TickOutcome::OutsideWindow),
                })
                .collect());
        }

        let mut reports = Vec::with_capacity(self.indicators.len());
        for indicator in &self.indicators {
            let result = self.evaluate_indicator(indicator, now).await;
            reports.push(TickReport {
                indicator_type: indicator.indicator_type.clone(),
                result,
            });
        }
        Ok(reports)
    }

    /// Evaluate one indicator; the caller has already checked the window
    async fn evaluate_indicator(&self, indicator: &TrackedIndicator, now: DateTime<Tz>) -> Result<TickOutcome> {
        let Some(state_lock) = self.states.get(&indicator.indicator_type) else {
            return Err(crate::error::AppError::NotFound(format!(
                "No alert state for indicator '{}'",
                indicator.indicator_type
            )));
        };
        let mut state = state_lock.lock().await;

        let today = now.date_naive();
        if state.roll_over(today) {
            info!(indicator = %indicator.indicator_type, "Reset alert tracking for new day");
        }

        let (comparison_price, reference) = match state.last_alert_price {
            Some(price) => (price, ReferenceKind::LastAlertPrice),
            None => match self.previous_close(&indicator.indicator_type, today).await? {
                Some(sample) => (sample.value, ReferenceKind::PreviousClose),
                None => {
                    debug!(indicator = %indicator.indicator_type, "No comparison price available");
                    return Ok(TickOutcome::NoComparisonPrice);
                }
            },
        };

        let current = match with_timeout("read latest sample", self.call_timeout, self.series.latest(&indicator.indicator_type)).await? {
            Some(sample) => sample,
            None => {
                debug!(indicator = %indicator.indicator_type, "No current price available");
                return Ok(TickOutcome::NoCurrentPrice);
            }
        };

        let Some(change) = percent_change(current.value, comparison_price) else {
            warn!(
                indicator = %indicator.indicator_type,
                comparison_price,
                reference = %reference,
                "Comparison price is zero, skipping evaluation"
            );
            return Ok(TickOutcome::ZeroComparisonPrice);
        };

        info!(
            indicator = %indicator.indicator_type,
            current = %format!("{:.2}", current.value),
            reference = %reference,
            comparison = %format!("{:.2}", comparison_price),
            change_pct = %format!("{:.2}", change),
            "Price check"
        );

        if change.abs() < indicator.threshold_pct {
            return Ok(TickOutcome::BelowThreshold {
                current_price: current.value,
                comparison_price,
                percent_change: change,
            });
        }

        let (subject, body) = alert_message(indicator, &current, comparison_price, change, reference, self.timezone);
        with_timeout("send alert email", self.call_timeout, self.notifier.send(&self.recipients, &subject, &body)).await?;

        state.record_alert(current.value, today);
        info!(
            indicator = %indicator.indicator_type,
            new_reference = %format!("{:.2}", current.value),
            "Alert sent, new reference price set"
        );

        Ok(TickOutcome::Alerted {
            current_price: current.value,
            comparison_price,
            percent_change: change,
            reference,
        })
    }

    async fn previous_close(&self, indicator_type: &str, today: NaiveDate) -> Result<Option<Sample>> {
        let Some(yesterday) = today.pred_opt() else {
            return Ok(None);
        };
        with_timeout("read previous close", self.call_timeout, self.series.last_on_day(indicator_type, yesterday)).await
    }

    /// Current alert state of every tracked indicator
    ///
    /// Never waits on a running tick: an indicator whose evaluation is in
    /// flight is reported as `None`.
    pub fn snapshot(&self) -> Vec<(String, Option<AlertState>)> {
        self.indicators
            .iter()
            .filter_map(|indicator| {
                let lock = self.states.get(&indicator.indicator_type)?;
                Some((indicator.indicator_type.clone(), lock.try_lock().ok().map(|state| *state)))
            })
            .collect()
    }
}

/// Subject and plain-text body of an alert email
pub fn alert_message(
    indicator: &TrackedIndicator,
    current: &Sample,
    comparison_price: f64,
    percent_change: f64,
    reference: ReferenceKind,
    timezone: Tz,
) -> (String, String) {
    let name = indicator.display_name();
    let subject = format!("{} Price Alert - {:.2}% Change", name, percent_change);
    let updated = current.timestamp.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S %Z");

    let body = format!(
        "{upper} PRICE ALERT - Significant Change Detected\n\
         \n\
         Current {name} Price: {current:.2}\n\
         Time of Last Update: {updated}\n\
         Comparison Price: {comparison:.2}\n\
         Percentage Change: {change:.2}%\n\
         \n\
         This alert was triggered because the price change exceeded the {threshold}% threshold.\n\
         Reference price was {reference}.\n",
        upper = name.to_uppercase(),
        name = name,
        current = current.value,
        updated = updated,
        comparison = comparison_price,
        change = percent_change,
        threshold = indicator.threshold_pct,
        reference = reference,
    );

    (subject, body)
}
