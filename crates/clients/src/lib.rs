//! HTTP clients for the inventory, ledger, and payment collaborators.
//!
//! Reads go through a [`CircuitBreaker`] per operation and degrade to an empty
//! page or a placeholder when the collaborator is failing. Writes are sent
//! directly; when the collaborator cannot be reached at all, a copy of the
//! request is pushed to the retry backlog before the error is returned.

pub mod breaker;
pub mod dto;
mod http;
pub mod inventory;
pub mod ledger;
pub mod payment;
pub mod replay;

pub use breaker::{BreakerConfig, BreakerError, CircuitBreaker, State};
pub use inventory::HttpInventory;
pub use ledger::{HttpLedger, USER_HEADER};
pub use payment::HttpPayments;
pub use replay::{ReplayError, replay};
