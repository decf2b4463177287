//! Saga orchestration for vehicle rentals.
//!
//! This crate coordinates three independently failing collaborators (vehicle
//! inventory, rental ledger, payments) without a distributed transaction.
//!
//! The StartRental saga follows these steps:
//! 1. Lock the vehicle
//! 2. Create the payment
//! 3. Record the rental
//!
//! If a step fails, previously completed steps are compensated in reverse
//! order. CancelRental compensates the same way; FinishRental is forward-only.

pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod services;
pub mod steps;

pub use compensation::Compensations;
pub use coordinator::{RentalCoordinator, RentalDetails, StartRental, StartedRental};
pub use error::{RollbackFailure, SagaError, Service, ServiceError};
pub use services::{
    Fault, InMemoryInventory, InMemoryLedger, InMemoryPayments, InventoryApi, Journal, LedgerApi,
    LockOutcome, PaymentApi, StatusChange,
};
