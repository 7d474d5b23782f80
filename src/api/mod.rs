//! HTTP API
//!
//! Thin axum surface over [`AuditService`]. Handlers return
//! `(StatusCode, Json<Value>)`; failures carry `{"error": ...}`.

pub mod anchors;
pub mod records;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::AuditError;
use crate::service::AuditService;

pub type AppState = Arc<AuditService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/dashboard-quick", get(records::dashboard))
        .route(
            "/records",
            post(records::create_record)
                .get(records::list_records)
                .delete(records::delete_all_records),
        )
        .route("/records/search", post(records::search_records))
        .route(
            "/records/check-duplicate/:name",
            get(records::check_duplicate_name),
        )
        .route(
            "/records/:id",
            get(records::get_record).delete(records::delete_record),
        )
        .route("/records/:id/verify", get(records::verify_record))
        .route("/verify-all", get(records::verify_all))
        .route("/tamper", post(records::tamper))
        .route("/anchors/reanchor-missing", post(anchors::reanchor_missing))
        .route("/anchors/:id", post(anchors::anchor_record))
        .route("/cache/clear", post(anchors::clear_cache))
        .route("/transactions", get(anchors::recent_transactions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(service)
}

async fn health_check(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    match service.status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "service": "ledger-audit",
                "timestamp": chrono::Utc::now(),
                "details": status,
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "service": "ledger-audit",
                    "timestamp": chrono::Utc::now(),
                    "error": e.to_string(),
                })),
            )
        }
    }
}

pub fn status_for(err: &AuditError) -> StatusCode {
    match err {
        AuditError::NotFound(_) => StatusCode::NOT_FOUND,
        AuditError::DuplicateId(_) | AuditError::DuplicateName { .. } => StatusCode::CONFLICT,
        AuditError::Validation(_) | AuditError::MalformedDigest(_) => StatusCode::BAD_REQUEST,
        AuditError::LedgerRejected(_) => StatusCode::BAD_GATEWAY,
        AuditError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuditError::AlertDeliveryFailed(_) | AuditError::Database(_) | AuditError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn error_response(err: AuditError) -> (StatusCode, Json<Value>) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }

    let mut body = serde_json::json!({ "error": err.to_string() });
    if let AuditError::DuplicateName { existing_id, .. } = &err {
        body["existing_id"] = serde_json::json!(existing_id);
    }
    (status, Json(body))
}

/// Serialize a successful payload, falling back to a 500 if it cannot be
pub fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> (StatusCode, Json<Value>) {
    match serde_json::to_value(value) {
        Ok(body) => (status, Json(body)),
        Err(e) => error_response(AuditError::from(e)),
    }
}
