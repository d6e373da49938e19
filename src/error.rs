//! Error taxonomy for the campaign engine.
//!
//! Every engine operation returns `CoreError` to its immediate caller; the
//! HTTP layer translates variants to status codes via `IntoResponse`. The
//! engine itself never retries validation-class errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Proximity conflict: {0}")]
    ProximityConflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl CoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::CapacityExceeded(_) => StatusCode::CONFLICT,
            CoreError::ProximityConflict(_) => StatusCode::FORBIDDEN,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::InvalidState(_) => StatusCode::CONFLICT,
            CoreError::RefundFailed(_) => StatusCode::BAD_GATEWAY,
            CoreError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status_code() {
        let error = CoreError::NotFound("Product not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_proximity_conflict_status_code() {
        let error =
            CoreError::ProximityConflict("another purchase is in progress within 2 km".to_string());
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert!(error.to_string().contains("2 km"));
    }

    #[test]
    fn test_capacity_exceeded_status_code() {
        let error = CoreError::CapacityExceeded("11 > 10".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_refund_failed_status_code() {
        let error = CoreError::RefundFailed("provider declined".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_storage_status_code() {
        let error = CoreError::Storage(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
