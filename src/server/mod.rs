pub mod api;
pub mod pages;

use crate::error::Result;
use crate::services::{AlertEvaluator, SharedHealthStats, SharedParameterStore, SharedTimeSeriesStore};
use axum::{
    extract::FromRef,
    response::Redirect,
    routing::{get, put},
    Router,
};
use chrono_tz::Tz;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub series: SharedTimeSeriesStore,
    pub parameters: SharedParameterStore,
    pub evaluator: Arc<AlertEvaluator>,
    pub health_stats: SharedHealthStats,
    pub timezone: Tz,
    pub call_timeout: Duration,
    pub started_at: Instant,
}

// FromRef implementations to extract specific state components
impl FromRef<AppState> for SharedTimeSeriesStore {
    fn from_ref(app_state: &AppState) -> SharedTimeSeriesStore {
        app_state.series.clone()
    }
}

impl FromRef<AppState> for SharedParameterStore {
    fn from_ref(app_state: &AppState) -> SharedParameterStore {
        app_state.parameters.clone()
    }
}

impl FromRef<AppState> for SharedHealthStats {
    fn from_ref(app_state: &AppState) -> SharedHealthStats {
        app_state.health_stats.clone()
    }
}

/// Dashboard, editor pages and JSON API
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/dashboard", get(pages::dashboard_handler))
        .route("/settings", get(pages::settings_handler))
        .route("/api/samples", get(api::list_samples_handler).post(api::create_sample_handler))
        .route(
            "/api/samples/{id}",
            get(api::get_sample_handler)
                .put(api::update_sample_handler)
                .delete(api::delete_sample_handler),
        )
        .route("/api/parameters", get(api::list_parameters_handler))
        .route("/api/parameters/{name}", put(api::update_parameter_handler))
        .route("/health", get(api::health_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Start the axum server and run until `shutdown` resolves
pub async fn serve<F>(app_state: AppState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Registering routes:");
    tracing::info!("  GET /dashboard, GET /settings");
    tracing::info!("  GET|POST /api/samples, GET|PUT|DELETE /api/samples/{{id}}");
    tracing::info!("  GET /api/parameters, PUT /api/parameters/{{name}}");
    tracing::info!("  GET /health");

    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
