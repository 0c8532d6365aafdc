mod alert_state;
mod app_config;
mod indicator;
mod parameter;
mod sample;
mod time_of_day;

pub use alert_state::AlertState;
pub use app_config::{AppConfig, PerplexityConfig, SmtpConfig};
pub use indicator::{parse_tracked_indicators, TrackedIndicator};
pub use parameter::{Parameter, ParameterUpdate};
pub use sample::{normalize_timestamp, round_value, NewSample, Sample, SampleUpdate};
pub use time_of_day::TimeOfDay;
