pub mod alert_worker;
pub mod collector_worker;
pub mod digest_worker;
pub mod schedule;

pub use alert_worker::run as run_alert_worker;
pub use collector_worker::run as run_collector_worker;
pub use digest_worker::{run as run_digest_worker, DigestContext};
