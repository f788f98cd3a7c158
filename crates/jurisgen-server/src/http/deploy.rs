use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use super::{AppState, Success};
use crate::deploy::{BytecodeResponse, ConfirmDeployment, GasEstimate, GasEstimateRequest};
use crate::error::ApiError;

pub(super) async fn prepare(
    State(service): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let payload = service.prepare_deployment(id).await?;
    Ok(Json(json!({
        "success": true,
        "deployment_data": payload.deployment_data,
        "instructions": payload.instructions,
    })))
}

pub(super) async fn confirm(
    State(service): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ConfirmDeployment>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let Json(confirm) = body?;
    let contract = service.confirm_deployment(id, confirm).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Deployment confirmed successfully",
        "contract_id": contract.id,
        "transaction_hash": contract.transaction_hash,
        "contract_address": contract.contract_address,
        "contract": contract,
    })))
}

pub(super) async fn bytecode(
    State(service): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Success<BytecodeResponse>>, ApiError> {
    let Path(id) = id?;
    Ok(Json(Success::new(service.bytecode(id).await?)))
}

pub(super) async fn estimate_gas(
    State(service): State<AppState>,
    body: Result<Json<GasEstimateRequest>, JsonRejection>,
) -> Result<Json<Success<GasEstimate>>, ApiError> {
    let Json(request) = body?;
    Ok(Json(Success::new(service.estimate_gas(&request))))
}
