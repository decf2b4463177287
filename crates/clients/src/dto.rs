//! JSON shapes spoken by the collaborators.

use domain::{
    DomainError, Payment, PaymentStatus, Rental, RentalPeriod, RentalProperties, RentalStatus,
    Uid, Vehicle, VehicleType,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub vehicle_uid: Uid,
    pub brand: String,
    pub model: String,
    pub registration_number: String,
    pub power: u64,
    pub price: u64,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub availability: bool,
}

impl From<VehicleDto> for Vehicle {
    fn from(dto: VehicleDto) -> Self {
        Self {
            uid: dto.vehicle_uid,
            brand: dto.brand,
            model: dto.model,
            registration_number: dto.registration_number,
            power: dto.power,
            price: dto.price,
            vehicle_type: dto.vehicle_type,
            available: dto.availability,
        }
    }
}

impl From<&Vehicle> for VehicleDto {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            vehicle_uid: vehicle.uid,
            brand: vehicle.brand.clone(),
            model: vehicle.model.clone(),
            registration_number: vehicle.registration_number.clone(),
            power: vehicle.power,
            price: vehicle.price,
            vehicle_type: vehicle.vehicle_type,
            availability: vehicle.available,
        }
    }
}

/// A page of items with the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDto<T> {
    pub items: Vec<T>,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub payment_uid: Uid,
    pub status: PaymentStatus,
    pub price: u64,
}

impl From<PaymentDto> for Payment {
    fn from(dto: PaymentDto) -> Self {
        Self {
            uid: dto.payment_uid,
            status: dto.status,
            price: dto.price,
        }
    }
}

impl From<&Payment> for PaymentDto {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_uid: payment.uid,
            status: payment.status,
            price: payment.price,
        }
    }
}

/// Rental fields sent when creating a rental. Dates travel as `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalPropertiesDto {
    pub username: String,
    pub payment_uid: Uid,
    pub vehicle_uid: Uid,
    pub date_from: String,
    pub date_to: String,
    pub status: RentalStatus,
}

impl From<&RentalProperties> for RentalPropertiesDto {
    fn from(properties: &RentalProperties) -> Self {
        Self {
            username: properties.owner.clone(),
            payment_uid: properties.payment_uid,
            vehicle_uid: properties.vehicle_uid,
            date_from: properties.period.from().format(domain::rental::DATE_FORMAT).to_string(),
            date_to: properties.period.to().format(domain::rental::DATE_FORMAT).to_string(),
            status: properties.status,
        }
    }
}

impl TryFrom<RentalPropertiesDto> for RentalProperties {
    type Error = DomainError;

    fn try_from(dto: RentalPropertiesDto) -> Result<Self, Self::Error> {
        Ok(Self {
            owner: dto.username,
            payment_uid: dto.payment_uid,
            vehicle_uid: dto.vehicle_uid,
            period: RentalPeriod::parse(&dto.date_from, &dto.date_to)?,
            status: dto.status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalDto {
    pub rental_uid: Uid,
    #[serde(flatten)]
    pub properties: RentalPropertiesDto,
}

impl TryFrom<RentalDto> for Rental {
    type Error = DomainError;

    fn try_from(dto: RentalDto) -> Result<Self, Self::Error> {
        Ok(Self {
            uid: dto.rental_uid,
            properties: dto.properties.try_into()?,
        })
    }
}

impl From<&Rental> for RentalDto {
    fn from(rental: &Rental) -> Self {
        Self {
            rental_uid: rental.uid,
            properties: (&rental.properties).into(),
        }
    }
}
