use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{error_response, json_response, AppState};
use crate::database::{NewRecord, RecordId, SearchFilter};

const DASHBOARD_RECORDS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct VerifyAllParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TamperRequest {
    pub id: RecordId,
    pub field: String,
    pub value: String,
}

pub async fn create_record(
    State(service): State<AppState>,
    Json(new): Json<NewRecord>,
) -> (StatusCode, Json<Value>) {
    match service.create_record(new).await {
        // The anchor task keeps running after its handle is dropped
        Ok(created) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "record": created.record,
                "anchor": "pending",
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn list_records(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    match service.list_records().await {
        Ok(records) => json_response(StatusCode::OK, &records),
        Err(e) => error_response(e),
    }
}

pub async fn dashboard(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    match service.dashboard(DASHBOARD_RECORDS).await {
        Ok(dashboard) => json_response(StatusCode::OK, &dashboard),
        Err(e) => error_response(e),
    }
}

pub async fn delete_all_records(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    match service.delete_all_records().await {
        Ok(deleted) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted_count": deleted })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn get_record(
    State(service): State<AppState>,
    Path(id): Path<RecordId>,
) -> (StatusCode, Json<Value>) {
    match service.get_record(id).await {
        Ok(record) => json_response(StatusCode::OK, &record),
        Err(e) => error_response(e),
    }
}

pub async fn delete_record(
    State(service): State<AppState>,
    Path(id): Path<RecordId>,
) -> (StatusCode, Json<Value>) {
    match service.delete_record(id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "deleted": id }))),
        Err(e) => error_response(e),
    }
}

pub async fn search_records(
    State(service): State<AppState>,
    Json(filter): Json<SearchFilter>,
) -> (StatusCode, Json<Value>) {
    match service.search_records(&filter).await {
        Ok(records) => json_response(StatusCode::OK, &records),
        Err(e) => error_response(e),
    }
}

pub async fn check_duplicate_name(
    State(service): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<Value>) {
    match service.check_duplicate_name(&name).await {
        Ok(matches) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "name": name,
                "exists": !matches.is_empty(),
                "matches": matches,
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn verify_record(
    State(service): State<AppState>,
    Path(id): Path<RecordId>,
) -> (StatusCode, Json<Value>) {
    match service.verify_record(id).await {
        Ok(report) => json_response(StatusCode::OK, &report),
        Err(e) => error_response(e),
    }
}

pub async fn verify_all(
    State(service): State<AppState>,
    Query(params): Query<VerifyAllParams>,
) -> (StatusCode, Json<Value>) {
    match service.verify_all(params.limit).await {
        Ok(summary) => {
            info!(
                "verify-all: {} examined, {} tampered, {} inconsistent",
                summary.examined, summary.tampered, summary.inconsistent
            );
            json_response(StatusCode::OK, &summary)
        }
        Err(e) => error_response(e),
    }
}

/// Edit a field without touching the stored digest
pub async fn tamper(
    State(service): State<AppState>,
    Json(request): Json<TamperRequest>,
) -> (StatusCode, Json<Value>) {
    warn!(
        "Tamper request: record {} field '{}'",
        request.id, request.field
    );
    match service
        .update_field(request.id, &request.field, &request.value)
        .await
    {
        Ok(record) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "record": record,
                "note": "stored digest left unchanged; verify to detect the edit",
            })),
        ),
        Err(e) => error_response(e),
    }
}
