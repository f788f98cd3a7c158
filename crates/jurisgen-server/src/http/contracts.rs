use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use jurisgen_core::{GenerationRequest, StatusUpdate};

use super::AppState;
use crate::error::ApiError;
use crate::service::ListQuery;

pub(super) async fn generate(
    State(service): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = body?;
    let contract = service.generate(&request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "contract": contract,
            "message": "Contract generated successfully",
        })),
    ))
}

pub(super) async fn validate(
    State(service): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let validation = service.validate(&request);
    Ok(Json(json!({"success": true, "validation": validation})))
}

pub(super) async fn list(
    State(service): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let contracts: Vec<_> = service.list(&query).await?.iter().map(|c| c.summary()).collect();
    Ok(Json(json!({
        "success": true,
        "count": contracts.len(),
        "contracts": contracts,
    })))
}

pub(super) async fn stats(State(service): State<AppState>) -> Result<Json<Value>, ApiError> {
    let counts = service.stats().await?;
    Ok(Json(json!({"success": true, "stats": counts})))
}

pub(super) async fn get_one(
    State(service): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let contract = service.get(id).await?;
    Ok(Json(json!({"success": true, "contract": contract})))
}

pub(super) async fn update_status(
    State(service): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Json(update) = body?;
    let contract = service.update_status(id, update).await?;
    Ok(Json(json!({
        "success": true,
        "contract": contract,
        "message": format!("Contract status updated to {}", contract.status),
    })))
}

pub(super) async fn regenerate(
    State(service): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let contract = service.regenerate(id).await?;
    Ok(Json(json!({
        "success": true,
        "contract": contract,
        "message": "Contract regenerated successfully",
    })))
}
