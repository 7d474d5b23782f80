use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{error_response, json_response, AppState};
use crate::database::RecordId;

const DEFAULT_TRANSACTIONS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct TransactionsParams {
    pub limit: Option<usize>,
}

pub async fn anchor_record(
    State(service): State<AppState>,
    Path(id): Path<RecordId>,
) -> (StatusCode, Json<Value>) {
    match service.anchor_record(id).await {
        Ok(receipt) => json_response(StatusCode::OK, &receipt),
        Err(e) => error_response(e),
    }
}

pub async fn reanchor_missing(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    match service.reanchor_missing().await {
        Ok(summary) => json_response(StatusCode::OK, &summary),
        Err(e) => error_response(e),
    }
}

pub async fn clear_cache(State(service): State<AppState>) -> (StatusCode, Json<Value>) {
    let cleared = service.clear_cache().await;
    (StatusCode::OK, Json(serde_json::json!({ "cleared": cleared })))
}

pub async fn recent_transactions(
    State(service): State<AppState>,
    Query(params): Query<TransactionsParams>,
) -> (StatusCode, Json<Value>) {
    let history = service
        .recent_transactions(params.limit.unwrap_or(DEFAULT_TRANSACTIONS))
        .await;
    json_response(StatusCode::OK, &history)
}
