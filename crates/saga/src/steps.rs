//! Rental saga and step names.
//!
//! Step names appear in logs, metrics labels, and error messages.

/// Saga name: book a vehicle for a period.
pub const SAGA_START_RENTAL: &str = "StartRental";

/// Saga name: cancel an in-progress rental.
pub const SAGA_CANCEL_RENTAL: &str = "CancelRental";

/// Saga name: close a rental once the vehicle is returned.
pub const SAGA_FINISH_RENTAL: &str = "FinishRental";

/// Step name: Look up the rental and check its owner.
pub const STEP_LOOKUP_RENTAL: &str = "lookup_rental";

/// Step name: Take the booking lock on the vehicle.
pub const STEP_LOCK_VEHICLE: &str = "lock_vehicle";

/// Step name: Charge the rental price.
pub const STEP_CREATE_PAYMENT: &str = "create_payment";

/// Step name: Record the rental in the ledger.
pub const STEP_CREATE_RENTAL: &str = "create_rental";

/// Step name: Release the booking lock on the vehicle.
pub const STEP_UNLOCK_VEHICLE: &str = "unlock_vehicle";

pub const STEP_CANCEL_RENTAL: &str = "cancel_rental";

pub const STEP_CANCEL_PAYMENT: &str = "cancel_payment";

pub const STEP_FINISH_RENTAL: &str = "finish_rental";
