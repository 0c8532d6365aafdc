use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Worker statistics exposed by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStats {
    // Alert worker
    pub alert_last_run: Option<String>,
    pub alert_iteration_count: u64,
    pub alerts_sent: u64,
    pub alert_errors: u64,

    // Collector worker
    pub collect_last_run: Option<String>,
    pub collect_iteration_count: u64,
    pub samples_collected: u64,

    // Digest worker
    pub digest_last_sent: Option<String>,

    pub is_monitoring_hours: bool,
    pub timezone: String,

    pub started_at: String,
    pub uptime_secs: u64,
    pub current_system_time: String,
}

impl Default for HealthStats {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            alert_last_run: None,
            alert_iteration_count: 0,
            alerts_sent: 0,
            alert_errors: 0,
            collect_last_run: None,
            collect_iteration_count: 0,
            samples_collected: 0,
            digest_last_sent: None,
            is_monitoring_hours: false,
            timezone: "UTC".to_string(),
            started_at: now.clone(),
            uptime_secs: 0,
            current_system_time: now,
        }
    }
}

pub type SharedHealthStats = Arc<RwLock<HealthStats>>;

pub fn new_shared_health_stats(timezone: &str) -> SharedHealthStats {
    Arc::new(RwLock::new(HealthStats {
        timezone: timezone.to_string(),
        ..HealthStats::default()
    }))
}
