//! Saga error types.

use backlog::BacklogError;
use common::Uid;
use domain::DomainError;
use thiserror::Error;

/// The collaborator a call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Inventory,
    Ledger,
    Payment,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Service::Inventory => "inventory",
            Service::Ledger => "ledger",
            Service::Payment => "payment",
        };
        f.write_str(name)
    }
}

/// Errors returned by collaborator write calls.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The collaborator could not be reached. The request was queued for
    /// replay.
    #[error("{service} service unavailable: {reason}")]
    Unavailable { service: Service, reason: String },

    /// The collaborator answered with a definitive rejection.
    #[error("{service} service rejected the request ({status}): {message}")]
    Rejected {
        service: Service,
        status: u16,
        message: String,
    },

    /// The request reached the collaborator but the exchange broke down.
    #[error("{service} request failed: {reason}")]
    Transport { service: Service, reason: String },

    /// The collaborator answered with a body that could not be read.
    #[error("{service} response could not be decoded: {reason}")]
    Decode { service: Service, reason: String },

    /// The collaborator could not be reached and queueing the request for
    /// replay failed as well.
    #[error("{cause}; request could not be queued for retry: {backlog}")]
    NotQueued {
        cause: Box<ServiceError>,
        #[source]
        backlog: BacklogError,
    },
}

impl ServiceError {
    pub fn service(&self) -> Service {
        match self {
            ServiceError::Unavailable { service, .. }
            | ServiceError::Rejected { service, .. }
            | ServiceError::Transport { service, .. }
            | ServiceError::Decode { service, .. } => *service,
            ServiceError::NotQueued { cause, .. } => cause.service(),
        }
    }

    /// Returns true when the collaborator was never reached.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ServiceError::Unavailable { .. } => true,
            ServiceError::NotQueued { cause, .. } => cause.is_unavailable(),
            _ => false,
        }
    }
}

/// A compensating call that failed while rolling a saga back.
#[derive(Debug, Error)]
#[error("rollback {step}: {error}")]
pub struct RollbackFailure {
    pub step: &'static str,
    #[source]
    pub error: ServiceError,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was invalid before any collaborator was called.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("vehicle not found: {0}")]
    VehicleNotFound(Uid),

    #[error("vehicle already rented: {0}")]
    VehicleAlreadyRented(Uid),

    #[error("rental not found: {0}")]
    RentalNotFound(Uid),

    #[error("rental {0} does not belong to the caller")]
    RentalNotPermitted(Uid),

    #[error("payment not found: {0}")]
    PaymentNotFound(Uid),

    /// A saga step failed.
    #[error("saga step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: ServiceError,
    },

    /// A saga step did not finish before the request deadline.
    #[error("saga step '{step}' did not finish before the request deadline")]
    DeadlineExceeded { step: &'static str },

    /// A step failed after earlier steps had taken effect, and those steps
    /// were compensated. Every compensation that failed is kept.
    #[error("{}", display_rolled_back(.cause, .failures))]
    RolledBack {
        cause: Box<SagaError>,
        failures: Vec<RollbackFailure>,
    },
}

fn display_rolled_back(cause: &SagaError, failures: &[RollbackFailure]) -> String {
    let mut message = cause.to_string();
    for failure in failures {
        message.push_str("; ");
        message.push_str(&failure.to_string());
    }
    message
}

impl SagaError {
    /// Returns the error that started the saga's failure, looking through
    /// any rollback.
    pub fn root_cause(&self) -> &SagaError {
        match self {
            SagaError::RolledBack { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Returns the compensations that failed, if the saga was rolled back.
    pub fn rollback_failures(&self) -> &[RollbackFailure] {
        match self {
            SagaError::RolledBack { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Returns true when the root cause is an unreachable collaborator.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self.root_cause(),
            SagaError::StepFailed { source, .. } if source.is_unavailable()
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable(service: Service) -> ServiceError {
        ServiceError::Unavailable {
            service,
            reason: "dns error".to_string(),
        }
    }

    #[test]
    fn rolled_back_message_keeps_every_cause() {
        let err = SagaError::RolledBack {
            cause: Box::new(SagaError::StepFailed {
                step: "create_payment",
                source: unavailable(Service::Payment),
            }),
            failures: vec![RollbackFailure {
                step: "lock_vehicle",
                error: unavailable(Service::Inventory),
            }],
        };

        let message = err.to_string();
        assert!(message.contains("payment service unavailable"));
        assert!(message.contains("rollback lock_vehicle: inventory service unavailable"));
        assert!(err.is_unavailable());
        assert_eq!(err.rollback_failures().len(), 1);
    }

    #[test]
    fn root_cause_looks_through_rollback() {
        let err = SagaError::RolledBack {
            cause: Box::new(SagaError::PaymentNotFound(Uid::new())),
            failures: vec![],
        };
        assert!(matches!(err.root_cause(), SagaError::PaymentNotFound(_)));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn not_queued_is_still_unavailable() {
        let err = ServiceError::NotQueued {
            cause: Box::new(unavailable(Service::Ledger)),
            backlog: BacklogError::TopicNotReady("rentals".to_string()),
        };
        assert!(err.is_unavailable());
        assert_eq!(err.service(), Service::Ledger);
        assert!(err.to_string().contains("could not be queued"));
    }
}
