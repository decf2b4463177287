//! Domain layer for the rental orchestrator.
//!
//! This crate holds the records exchanged with the three collaborators:
//! - Vehicles, whose availability flag is the booking lock
//! - Payments, created already paid and only ever canceled
//! - Rentals, tying an owner, a vehicle, and a payment to a date range
//!
//! It also defines the lookup outcomes that let read paths report a degraded
//! answer instead of an error.

pub mod error;
pub mod lookup;
pub mod payment;
pub mod rental;
pub mod vehicle;

pub use common::{Page, PageRequest, Uid};
pub use error::DomainError;
pub use lookup::{Lookup, RentalLookup};
pub use payment::{Payment, PaymentStatus};
pub use rental::{Rental, RentalPeriod, RentalProperties, RentalStatus};
pub use vehicle::{Vehicle, VehicleType};
