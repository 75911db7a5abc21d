//! HTTP surface for the dashboard statistics.
//!
//! Axum handlers over a shared [`DashboardQuery`]. The sampling pipeline is
//! blocking (remote calls and inter-batch pauses), so each request runs it on
//! the blocking thread pool.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::error;

use crate::constants::server::{HEALTH_ROUTE, INTERNAL_ERROR, STATS_ROUTE, UPSTREAM_ERROR};
use crate::errors::PulseError;
use crate::query::{DashboardQuery, DashboardResponse};
use crate::source::RowSource;

/// Shared handler state.
pub struct AppState<S> {
    pub query: Arc<DashboardQuery<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            query: Arc::clone(&self.query),
        }
    }
}

impl<S> AppState<S> {
    pub fn new(query: DashboardQuery<S>) -> Self {
        Self {
            query: Arc::new(query),
        }
    }
}

/// Error body returned for fatal failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

/// Fatal query failure rendered as `{ error, details }`.
#[derive(Debug)]
pub struct ApiError(pub PulseError);

impl From<PulseError> for ApiError {
    fn from(err: PulseError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        if self.0.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn body(&self) -> ErrorBody {
        let headline = if self.0.is_upstream() {
            UPSTREAM_ERROR
        } else {
            INTERNAL_ERROR
        };
        ErrorBody {
            error: headline.to_string(),
            details: self.0.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check handler
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Aggregated statistics handler
pub async fn dashboard_stats<S>(
    State(state): State<AppState<S>>,
) -> Result<Json<DashboardResponse>, ApiError>
where
    S: RowSource + 'static,
{
    let query = Arc::clone(&state.query);
    let response = tokio::task::spawn_blocking(move || query.handle())
        .await
        .map_err(|err| PulseError::Worker(format!("statistics task failed: {err}")))?
        .inspect_err(|err| error!("[pulse:server] statistics request failed: {err}"))?;
    Ok(Json(response))
}

/// Build the router serving the statistics and health routes.
pub fn router<S>(state: AppState<S>) -> Router
where
    S: RowSource + 'static,
{
    Router::new()
        .route(STATS_ROUTE, get(dashboard_stats::<S>))
        .route(HEALTH_ROUTE, get(health_check))
        .with_state(state)
}
