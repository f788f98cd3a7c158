//! Axum routes. Handlers are thin: extract, call the service, wrap the result.

mod contracts;
mod deploy;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use jurisgen_core::GenerationRequest;

use crate::error::ApiError;
use crate::service::ContractService;

pub type AppState = Arc<ContractService>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `{"success": true, ...}` with the payload's fields inlined.
#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T> Success<T> {
    fn new(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}

/// Build the application router. `cors_origin` of `None` allows any origin.
pub fn router(service: AppState, cors_origin: Option<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);
    let cors = match cors_origin {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_origin(Any),
    };

    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/api/generate", post(contracts::generate))
        .route("/api/validate", post(contracts::validate))
        .route("/api/contracts", get(contracts::list))
        .route("/api/contracts/stats", get(contracts::stats))
        .route("/api/contracts/:id", get(contracts::get_one))
        .route("/api/contracts/:id/status", put(contracts::update_status))
        .route("/api/contracts/:id/regenerate", post(contracts::regenerate))
        .route("/api/deploy/estimate-gas", post(deploy::estimate_gas))
        .route("/api/deploy/:id", post(deploy::prepare))
        .route("/api/deploy/:id/confirm", post(deploy::confirm))
        .route("/api/deploy/:id/bytecode", get(deploy::bytecode))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": jurisgen_core::now(),
        "version": VERSION,
    }))
}

async fn api_info(State(service): State<AppState>) -> Json<Value> {
    let request_schema = schemars::schema_for!(GenerationRequest);
    Json(json!({
        "name": "Multi-Jurisdictional Smart Contract Generator API",
        "version": VERSION,
        "endpoints": {
            "contracts": {
                "POST /api/generate": "Generate new smart contract",
                "POST /api/validate": "Validate contract request",
                "GET /api/contracts": "List contracts (filters: jurisdiction, contract_type, status)",
                "GET /api/contracts/stats": "Count contracts by status",
                "GET /api/contracts/{id}": "Get specific contract",
                "PUT /api/contracts/{id}/status": "Update contract status",
                "POST /api/contracts/{id}/regenerate": "Regenerate a failed contract",
            },
            "deployment": {
                "POST /api/deploy/{id}": "Prepare contract deployment",
                "POST /api/deploy/{id}/confirm": "Confirm deployment",
                "GET /api/deploy/{id}/bytecode": "Get contract bytecode",
                "POST /api/deploy/estimate-gas": "Estimate deployment gas",
            },
        },
        "supported_jurisdictions": service.rules().jurisdictions(),
        "supported_contract_types": service.rules().contract_types(),
        "request_schema": request_schema,
    }))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}
