use crate::error::{with_timeout, Result};
use crate::models::{Sample, TrackedIndicator};
use crate::services::alert_evaluator::percent_change;
use crate::services::store::SharedTimeSeriesStore;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::time::Duration;

/// One indicator's line in the daily summary
#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    pub name: String,
    pub open: Option<f64>,
    pub latest: Option<f64>,
    pub previous_close: Option<f64>,
}

impl DigestEntry {
    pub fn change_since_open(&self) -> Option<f64> {
        percent_change(self.latest?, self.open?)
    }

    pub fn change_since_previous_close(&self) -> Option<f64> {
        percent_change(self.latest?, self.previous_close?)
    }
}

/// Gather today's open, latest and previous close for every indicator
pub async fn collect_entries(
    series: &SharedTimeSeriesStore,
    indicators: &[TrackedIndicator],
    today: NaiveDate,
    call_timeout: Duration,
) -> Result<Vec<DigestEntry>> {
    let mut entries = Vec::with_capacity(indicators.len());

    for indicator in indicators {
        let kind = indicator.indicator_type.as_str();
        let open = with_timeout("read day open", call_timeout, series.first_on_day(kind, today)).await?;
        let latest = with_timeout("read latest sample", call_timeout, series.latest(kind)).await?;
        let previous_close = match today.pred_opt() {
            Some(yesterday) => with_timeout("read previous close", call_timeout, series.last_on_day(kind, yesterday)).await?,
            None => None,
        };

        entries.push(DigestEntry {
            name: indicator.display_name(),
            open: open.map(|s: Sample| s.value),
            latest: latest.map(|s| s.value),
            previous_close: previous_close.map(|s| s.value),
        });
    }

    Ok(entries)
}

fn price(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

fn change(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}%", v))
}

/// Subject and plain-text body of the daily summary email
pub fn digest_message(entries: &[DigestEntry], today: NaiveDate) -> (String, String) {
    let subject = format!("Daily Price Summary - {}", today.format("%Y-%m-%d"));

    let mut body = format!("DAILY PRICE SUMMARY - {}\n\n", today.format("%A %d %B %Y"));
    for entry in entries {
        if entry.latest.is_none() {
            let _ = writeln!(body, "{}: no data\n", entry.name);
            continue;
        }

        let _ = writeln!(body, "{}", entry.name);
        let _ = writeln!(body, "  Latest: {}", price(entry.latest));
        let _ = writeln!(
            body,
            "  Today's open: {} ({})",
            price(entry.open),
            change(entry.change_since_open())
        );
        let _ = writeln!(
            body,
            "  Previous close: {} ({})\n",
            price(entry.previous_close),
            change(entry.change_since_previous_close())
        );
    }

    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSample;
    use crate::services::fakes::MemoryStore;
    use crate::services::store::TimeSeriesStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_entries() {
        let store = Arc::new(MemoryStore::new());
        for (d, h, v) in [(1, 16, 100.0), (2, 8, 101.0), (2, 12, 102.0)] {
            let ts = Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
            store.insert(NewSample::new("gold", "USA", v).at(ts)).await.unwrap();
        }

        let series: SharedTimeSeriesStore = store.clone();
        let indicators = vec![
            TrackedIndicator::new("gold", "USA", 0.1),
            TrackedIndicator::new("bitcoin", "USA", 2.0),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let entries = collect_entries(&series, &indicators, today, Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            entries[0],
            DigestEntry {
                name: "Gold".to_string(),
                open: Some(101.0),
                latest: Some(102.0),
                previous_close: Some(100.0),
            }
        );
        assert_eq!(entries[1].latest, None);
    }

    #[test]
    fn test_digest_message() {
        let entries = vec![
            DigestEntry {
                name: "Gold".to_string(),
                open: Some(100.0),
                latest: Some(101.0),
                previous_close: Some(102.0),
            },
            DigestEntry {
                name: "Bitcoin".to_string(),
                open: None,
                latest: None,
                previous_close: None,
            },
        ];
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let (subject, body) = digest_message(&entries, today);
        assert_eq!(subject, "Daily Price Summary - 2024-03-02");
        assert!(body.contains("Latest: 101.00"));
        assert!(body.contains("Today's open: 100.00 (+1.00%)"));
        assert!(body.contains("Previous close: 102.00 (-0.98%)"));
        assert!(body.contains("Bitcoin: no data"));
    }
}
