//! Collaborator traits and in-memory implementations for saga steps.
//!
//! Reads never fail: a collaborator that cannot be read answers with an empty
//! page or a degraded placeholder. Writes return `ServiceError` so the
//! coordinator can decide whether to compensate.

pub mod inventory;
pub mod ledger;
pub mod payment;

use std::sync::{Arc, Mutex, PoisonError};

pub use inventory::{InMemoryInventory, InventoryApi};
pub use ledger::{InMemoryLedger, LedgerApi};
pub use payment::{InMemoryPayments, PaymentApi};

use crate::error::{Service, ServiceError};

/// Outcome of a status-setting write.
///
/// `Queued` means the collaborator was unreachable and the change was stored
/// for replay. The caller cannot tell whether the target exists or whether
/// the change will eventually apply; it is treated as found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied,
    NotFound,
    Queued,
}

/// Outcome of trying to take the booking lock on a vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Locked(domain::Vehicle),
    NotFound,
    AlreadyLocked,
}

/// Failure injected into an in-memory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Behave as if the collaborator cannot be reached. Writes are deferred
    /// until [`replay_deferred`](InMemoryInventory::replay_deferred) is called,
    /// the way the backlog would deliver them later.
    Unreachable,
    /// Reject the call with a non-2xx status.
    Rejecting,
}

impl Fault {
    pub(crate) fn error(self, service: Service) -> ServiceError {
        match self {
            Fault::Unreachable => ServiceError::Unavailable {
                service,
                reason: "connection refused".to_string(),
            },
            Fault::Rejecting => ServiceError::Rejected {
                service,
                status: 500,
                message: "injected failure".to_string(),
            },
        }
    }
}

/// Shared record of collaborator calls, in the order they were made.
///
/// Entries look like `inventory.lock` or `ledger.set_status CANCELED`.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A write held back while its collaborator is unreachable.
pub(crate) type Deferred<S> = Box<dyn FnOnce(&mut S) + Send + Sync>;
