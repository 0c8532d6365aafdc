use crate::constants::{DEFAULT_SAMPLE_LIMIT, MAX_SAMPLE_LIMIT, TIME_PARAMETERS};
use crate::error::{with_timeout, AppError};
use crate::models::{AlertState, NewSample, ParameterUpdate, SampleUpdate, TimeOfDay};
use crate::server::AppState;
use crate::services::HealthStats;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) | AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Network(_) | AppError::Notification(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Database(_) | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Query parameters for GET /api/samples
#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    /// Only samples of this indicator type
    pub indicator_type: Option<String>,

    /// Number of samples to return, newest first (default 100, max 1000)
    pub limit: Option<i64>,
}

/// GET /api/samples - Recent samples, newest first
///
/// Examples:
/// - /api/samples
/// - /api/samples?indicator_type=gold&limit=20
#[instrument(skip(app_state))]
pub async fn list_samples_handler(
    State(app_state): State<AppState>,
    Query(params): Query<SampleQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_SAMPLE_LIMIT).clamp(1, MAX_SAMPLE_LIMIT);
    let indicator_type = params
        .indicator_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let samples = with_timeout(
        "list samples",
        app_state.call_timeout,
        app_state.series.recent(indicator_type, limit),
    )
    .await?;

    debug!(count = samples.len(), limit, "Returning samples");
    Ok(Json(samples))
}

/// GET /api/samples/{id}
#[instrument(skip(app_state))]
pub async fn get_sample_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match with_timeout("get sample", app_state.call_timeout, app_state.series.get(id)).await? {
        Some(sample) => Ok(Json(sample)),
        None => Err(AppError::NotFound(format!("Sample {} not found", id))),
    }
}

/// POST /api/samples - Insert a sample; `timestamp` defaults to now
#[instrument(skip(app_state))]
pub async fn create_sample_handler(
    State(app_state): State<AppState>,
    Json(sample): Json<NewSample>,
) -> Result<impl IntoResponse, AppError> {
    sample.validate().map_err(AppError::InvalidInput)?;

    let stored = with_timeout("insert sample", app_state.call_timeout, app_state.series.insert(sample)).await?;
    info!(
        id = stored.id,
        indicator = %stored.indicator_type,
        value = stored.value,
        "Sample created from editor"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

/// PUT /api/samples/{id} - Update any subset of a sample's fields
#[instrument(skip(app_state))]
pub async fn update_sample_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<SampleUpdate>,
) -> Result<impl IntoResponse, AppError> {
    match with_timeout("update sample", app_state.call_timeout, app_state.series.update(id, update)).await? {
        Some(sample) => {
            info!(id, indicator = %sample.indicator_type, value = sample.value, "Sample updated from editor");
            Ok(Json(sample))
        }
        None => Err(AppError::NotFound(format!("Sample {} not found", id))),
    }
}

/// DELETE /api/samples/{id}
#[instrument(skip(app_state))]
pub async fn delete_sample_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if with_timeout("delete sample", app_state.call_timeout, app_state.series.delete(id)).await? {
        info!(id, "Sample deleted from editor");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Sample {} not found", id)))
    }
}

/// GET /api/parameters
#[instrument(skip(app_state))]
pub async fn list_parameters_handler(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let parameters = with_timeout("list parameters", app_state.call_timeout, app_state.parameters.all_parameters()).await?;
    Ok(Json(parameters))
}

/// PUT /api/parameters/{name} - Create or replace a parameter
///
/// Time parameters are checked as `HH:MM` and stored zero-padded.
#[instrument(skip(app_state))]
pub async fn update_parameter_handler(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<ParameterUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Parameter name must not be empty".to_string()));
    }

    let value = if TIME_PARAMETERS.contains(&name) {
        TimeOfDay::parse(&update.value)
            .map_err(|e| AppError::InvalidInput(format!("Invalid value for {}: {}", name, e)))?
            .to_string()
    } else {
        update.value.trim().to_string()
    };

    let parameter = with_timeout(
        "set parameter",
        app_state.call_timeout,
        app_state.parameters.set_parameter(name, &value),
    )
    .await?;

    info!(name = %parameter.name, value = %parameter.value, "Parameter updated");
    Ok(Json(parameter))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub stats: HealthStats,
    pub alert_states: BTreeMap<String, AlertState>,
    /// Indicators whose evaluation holds their state right now
    pub evaluating: Vec<String>,
}

/// GET /health - Worker statistics and current alert state
pub async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    // Short timeout to avoid lock contention with the workers
    let health_snapshot = tokio::time::timeout(
        tokio::time::Duration::from_millis(100),
        app_state.health_stats.read(),
    )
    .await;

    let mut stats = match health_snapshot {
        Ok(health) => health.clone(),
        Err(_) => {
            warn!("Health stats lock timeout, using defaults");
            HealthStats::default()
        }
    };

    stats.uptime_secs = app_state.started_at.elapsed().as_secs();
    stats.current_system_time = Utc::now().to_rfc3339();

    let mut alert_states = BTreeMap::new();
    let mut evaluating = Vec::new();
    for (indicator, state) in app_state.evaluator.snapshot() {
        match state {
            Some(state) => {
                alert_states.insert(indicator, state);
            }
            None => evaluating.push(indicator),
        }
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            stats,
            alert_states,
            evaluating,
        }),
    )
}
