//! Uniform `{"error", "details"?}` error responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use jurisgen_generate::GenerationFailure;

use crate::service::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({"error": self.message, "details": details}),
            None => json!({"error": self.message}),
        };
        (self.status, Json(body)).into_response()
    }
}

fn generation_status(failure: &GenerationFailure) -> StatusCode {
    match failure {
        GenerationFailure::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(failure) => {
                let issues: Vec<Value> = failure
                    .issues
                    .iter()
                    .map(|issue| {
                        json!({
                            "code": issue.code(),
                            "field": issue.field(),
                            "message": issue.to_string(),
                        })
                    })
                    .collect();
                ApiError::bad_request("Validation failed")
                    .with_details(json!({"errors": failure.messages(), "issues": issues}))
            }
            ServiceError::NotFound(id) => ApiError::not_found(format!("Contract {id} not found")),
            ServiceError::Transition(e) => ApiError::bad_request(e.to_string())
                .with_details(json!({"code": "invalid_transition"})),
            ServiceError::StatusUpdate(e) => ApiError::bad_request(e.to_string()),
            ServiceError::InvalidState(e) => ApiError::bad_request(e.to_string())
                .with_details(json!({"code": "invalid_state"})),
            ServiceError::BadRequest(message) => ApiError::bad_request(message),
            ServiceError::Generation(failure) => {
                ApiError::new(generation_status(&failure), "Contract generation failed")
                    .with_details(json!({"kind": failure.kind(), "reason": failure.to_string()}))
            }
            ServiceError::Store(e) => {
                error!(error = %e, "contract store failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            ServiceError::Task(e) => {
                error!(error = %e, "contract store task failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Request must be valid JSON")
            .with_details(json!({"reason": rejection.body_text()}))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request("Invalid path parameter")
            .with_details(json!({"reason": rejection.body_text()}))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("Invalid query string")
            .with_details(json!({"reason": rejection.body_text()}))
    }
}

#[cfg(test)]
mod tests {
    use jurisgen_core::{StateTransitionError, ValidationFailure, ValidationIssue};

    use super::*;

    #[test]
    fn validation_lists_every_issue() {
        let err = ApiError::from(ServiceError::Validation(ValidationFailure {
            issues: vec![
                ValidationIssue::InvalidJurisdiction("mars".into()),
                ValidationIssue::MissingRequiredField("requirements".into()),
            ],
        }));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let details = err.details.unwrap();
        assert_eq!(details["issues"][0]["code"], "invalid_jurisdiction");
        assert_eq!(details["issues"][1]["field"], "requirements");
        assert_eq!(details["errors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ServiceError::NotFound(1), StatusCode::NOT_FOUND),
            (ServiceError::Transition(StateTransitionError::Terminal), StatusCode::BAD_REQUEST),
            (
                ServiceError::Generation(GenerationFailure::Timeout(30)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ServiceError::Generation(GenerationFailure::EmptyCode),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::Store(jurisgen_core::StoreError::Poisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }
}
