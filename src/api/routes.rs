//! API route definitions.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::ingest::{EventSubmission, IngestError};
use crate::tenant::ResolveError;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/logs", post(ingest_logs))
        .route("/anomalies", get(list_anomalies))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

/// Pull the tenant credential out of the `x-api-key` header.
fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<EventSubmission>,
) -> impl IntoResponse {
    match state.pipeline.ingest(api_key(&headers), submission).await {
        Ok(receipt) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "data": { "eventId": receipt.event_id },
                "meta": { "message": "log ingested" }
            })),
        ),
        Err(err) => error_response(&err),
    }
}

/// Map a pipeline error onto the transport. Only abort-class errors ever
/// reach here; the match stays exhaustive so a future degrade-class leak
/// shows up as a 500 instead of a panic.
fn error_response(err: &IngestError) -> (StatusCode, Json<Value>) {
    let status = match err {
        IngestError::Unauthenticated | IngestError::InvalidCredential => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match err {
        IngestError::Unauthenticated => "missing API key",
        IngestError::InvalidCredential => "invalid API key",
        _ => "internal server error",
    };
    (status, Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
struct AnomalyListParams {
    limit: Option<usize>,
}

async fn list_anomalies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AnomalyListParams>,
) -> impl IntoResponse {
    let Some(key) = api_key(&headers).filter(|k| !k.trim().is_empty()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "missing API key" })),
        );
    };

    let tenant = match state.tenants.resolve(key) {
        Ok(tenant) => tenant,
        Err(ResolveError::NoMatch) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "invalid API key" })),
            );
        }
        Err(ResolveError::Storage(e)) => {
            tracing::error!(error = %e, "tenant lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "internal server error" })),
            );
        }
    };

    let limit = params.limit.unwrap_or(50).min(500);
    match state.anomalies.list_for_tenant(tenant, limit) {
        Ok(anomalies) => {
            let total = anomalies.len();
            (
                StatusCode::OK,
                Json(json!({ "data": anomalies, "meta": { "total": total } })),
            )
        }
        Err(e) => {
            tracing::error!(tenant = %tenant, error = %e, "anomaly listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "internal server error" })),
            )
        }
    }
}
