//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed query parameters or headers.
    #[error("{0}")]
    BadRequest(String),

    /// A rental request that cannot be acted on.
    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Saga(err) => saga_status(err),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status for a saga failure, decided by the error that started it.
fn saga_status(err: &SagaError) -> StatusCode {
    match err.root_cause() {
        SagaError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SagaError::VehicleNotFound(_)
        | SagaError::RentalNotFound(_)
        | SagaError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        SagaError::RentalNotPermitted(_) => StatusCode::FORBIDDEN,
        SagaError::VehicleAlreadyRented(_) => StatusCode::LOCKED,
        _ if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "request rejected");
        }

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use common::Uid;
    use domain::DomainError;
    use saga::{RollbackFailure, Service, ServiceError};

    use super::*;

    fn unavailable(service: Service) -> ServiceError {
        ServiceError::Unavailable {
            service,
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_not_found_and_forbidden_are_distinguished() {
        let missing = ApiError::from(SagaError::RentalNotFound(Uid::new()));
        let foreign = ApiError::from(SagaError::RentalNotPermitted(Uid::new()));

        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(foreign.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_period_is_unprocessable() {
        let err = ApiError::from(SagaError::Domain(DomainError::InvalidDateFrom(
            "2024-13-01".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_rolled_back_outage_is_service_unavailable() {
        let err = ApiError::from(SagaError::RolledBack {
            cause: Box::new(SagaError::StepFailed {
                step: "create_payment",
                source: unavailable(Service::Payment),
            }),
            failures: vec![RollbackFailure {
                step: "lock_vehicle",
                error: unavailable(Service::Inventory),
            }],
        });

        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let message = err.to_string();
        assert!(message.contains("payment service unavailable"));
        assert!(message.contains("rollback lock_vehicle"));
    }

    #[test]
    fn test_rejected_step_is_internal_error() {
        let err = ApiError::from(SagaError::StepFailed {
            step: "create_rental",
            source: ServiceError::Rejected {
                service: Service::Ledger,
                status: 500,
                message: "boom".to_string(),
            },
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
