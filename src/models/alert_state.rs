use chrono::NaiveDate;
use serde::Serialize;

/// What the evaluator remembers about the last alert sent for one indicator
///
/// Lives in memory only. A new calendar day starts from an empty state, so the
/// first comparison of the day is always against the previous day's close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AlertState {
    /// Price of the sample that triggered the last alert
    pub last_alert_price: Option<f64>,

    /// Day (in the configured timezone) the last alert was sent
    pub last_alert_date: Option<NaiveDate>,
}

impl AlertState {
    /// Clear the state if it belongs to a day other than `today`
    ///
    /// Returns true when something was cleared.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        match self.last_alert_date {
            Some(date) if date != today => {
                *self = Self::default();
                true
            }
            _ => false,
        }
    }

    /// Record a confirmed alert at `price`
    pub fn record_alert(&mut self, price: f64, today: NaiveDate) {
        self.last_alert_price = Some(price);
        self.last_alert_date = Some(today);
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert_price.is_none() && self.last_alert_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_roll_over_clears_previous_day() {
        let mut state = AlertState::default();
        state.record_alert(100.5, day(1));

        assert!(state.roll_over(day(2)));
        assert!(state.is_empty());
    }

    #[test]
    fn test_roll_over_keeps_same_day() {
        let mut state = AlertState::default();
        state.record_alert(100.5, day(1));

        assert!(!state.roll_over(day(1)));
        assert_eq!(state.last_alert_price, Some(100.5));
    }

    #[test]
    fn test_roll_over_on_empty_state() {
        let mut state = AlertState::default();
        assert!(!state.roll_over(day(1)));
        assert!(state.is_empty());
    }
}
