//! Vehicles offered by the inventory.

use common::Uid;
use serde::{Deserialize, Serialize};

/// Body style of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    #[default]
    Sedan,
    Suv,
    Minivan,
    Roadster,
}

/// A rentable vehicle.
///
/// `available` doubles as the booking lock: the inventory only flips it to
/// `false` through a conditional update, which is what prevents two rentals
/// from holding the same vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub uid: Uid,
    pub brand: String,
    pub model: String,
    pub registration_number: String,
    pub power: u64,
    /// Price per night.
    pub price: u64,
    pub vehicle_type: VehicleType,
    pub available: bool,
}

impl Vehicle {
    /// Stand-in returned when the inventory cannot be read.
    ///
    /// Only the identifier is meaningful; every other field is empty.
    pub fn placeholder(uid: Uid) -> Self {
        Self {
            uid,
            brand: String::new(),
            model: String::new(),
            registration_number: String::new(),
            power: 0,
            price: 0,
            vehicle_type: VehicleType::default(),
            available: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_type_uses_upper_case_names() {
        let json = serde_json::to_string(&VehicleType::Roadster).unwrap();
        assert_eq!(json, "\"ROADSTER\"");
        let parsed: VehicleType = serde_json::from_str("\"SUV\"").unwrap();
        assert_eq!(parsed, VehicleType::Suv);
    }

    #[test]
    fn placeholder_keeps_only_the_identifier() {
        let uid = Uid::new();
        let vehicle = Vehicle::placeholder(uid);
        assert_eq!(vehicle.uid, uid);
        assert!(vehicle.brand.is_empty());
        assert_eq!(vehicle.price, 0);
    }
}
