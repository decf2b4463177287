//! Rental endpoints: listing, lookup, and the rental sagas.

use std::future::Future;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use domain::rental::DATE_FORMAT;
use domain::{Payment, PaymentStatus, Rental, RentalStatus, Uid};
use saga::{RentalDetails, StartRental, StartedRental};
use serde::{Deserialize, Serialize};

use super::{PageQuery, caller};
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRentalRequest {
    pub vehicle_uid: String,
    pub date_from: String,
    pub date_to: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment_uid: Uid,
    pub status: PaymentStatus,
    pub price: u64,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_uid: payment.uid,
            status: payment.status,
            price: payment.price,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalVehicleResponse {
    pub vehicle_uid: Uid,
    pub brand: String,
    pub model: String,
    pub registration_number: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalResponse {
    pub rental_uid: Uid,
    pub status: RentalStatus,
    pub date_from: String,
    pub date_to: String,
    pub vehicle: RentalVehicleResponse,
    pub payment: PaymentResponse,
}

impl From<RentalDetails> for RentalResponse {
    fn from(details: RentalDetails) -> Self {
        let RentalDetails {
            rental,
            vehicle,
            payment,
        } = details;
        let (date_from, date_to) = dates(&rental);
        Self {
            rental_uid: rental.uid,
            status: rental.properties.status,
            date_from,
            date_to,
            vehicle: RentalVehicleResponse {
                vehicle_uid: vehicle.uid,
                brand: vehicle.brand,
                model: vehicle.model,
                registration_number: vehicle.registration_number,
            },
            payment: payment.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedRentalResponse {
    pub rental_uid: Uid,
    pub status: RentalStatus,
    pub vehicle_uid: Uid,
    pub date_from: String,
    pub date_to: String,
    pub payment: PaymentResponse,
}

impl From<StartedRental> for StartedRentalResponse {
    fn from(started: StartedRental) -> Self {
        let (date_from, date_to) = dates(&started.rental);
        Self {
            rental_uid: started.rental.uid,
            status: started.rental.properties.status,
            vehicle_uid: started.rental.properties.vehicle_uid,
            date_from,
            date_to,
            payment: started.payment.into(),
        }
    }
}

fn dates(rental: &Rental) -> (String, String) {
    let period = rental.properties.period;
    (
        period.from().format(DATE_FORMAT).to_string(),
        period.to().format(DATE_FORMAT).to_string(),
    )
}

fn rental_uid(raw: &str) -> Result<Uid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("rental not found: {raw}")))
}

/// Runs a saga on its own task so a dropped connection cannot stop it
/// halfway through its steps or compensations.
async fn detached<T, F>(saga: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = saga::error::Result<T>> + Send + 'static,
{
    tokio::spawn(saga)
        .await
        .map_err(|e| ApiError::Internal(format!("saga task failed: {e}")))?
        .map_err(ApiError::from)
}

// -- Handlers --

/// GET /api/v1/rental. The caller's rentals with vehicle and payment.
#[tracing::instrument(skip(state, headers))]
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<RentalResponse>>, ApiError> {
    let owner = caller(&headers)?;
    let page = query.to_request()?;

    let rentals = state.coordinator.list_rentals(&owner, page).await?;
    Ok(Json(rentals.items.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/rental/{uid}
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> Result<Json<RentalResponse>, ApiError> {
    let owner = caller(&headers)?;
    let uid = rental_uid(&uid)?;

    let details = state.coordinator.get_rental(uid, &owner).await?;
    Ok(Json(details.into()))
}

/// POST /api/v1/rental. Books a vehicle for the caller.
#[tracing::instrument(skip(state, headers, body))]
pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<StartRentalRequest>, JsonRejection>,
) -> Result<Json<StartedRentalResponse>, ApiError> {
    let owner = caller(&headers)?;
    let Json(body) =
        body.map_err(|e| ApiError::Unprocessable(format!("invalid rental request: {e}")))?;
    let vehicle_uid = body.vehicle_uid.parse().map_err(|e| {
        ApiError::Unprocessable(format!("invalid rental request: {e}"))
    })?;

    let request = StartRental {
        vehicle_uid,
        date_from: body.date_from,
        date_to: body.date_to,
    };
    let coordinator = state.coordinator.clone();
    let started = detached(async move { coordinator.start_rental(&owner, request).await }).await?;

    Ok(Json(started.into()))
}

/// POST /api/v1/rental/{uid}/finish
#[tracing::instrument(skip(state, headers))]
pub async fn finish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = caller(&headers)?;
    let uid = rental_uid(&uid)?;

    let coordinator = state.coordinator.clone();
    detached(async move { coordinator.finish_rental(uid, &owner).await }).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/rental/{uid}. Cancels the rental and refunds the payment.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = caller(&headers)?;
    let uid = rental_uid(&uid)?;

    let coordinator = state.coordinator.clone();
    detached(async move { coordinator.cancel_rental(uid, &owner).await }).await?;

    Ok(StatusCode::NO_CONTENT)
}
