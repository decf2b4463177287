//! Vehicle listing endpoint.

use axum::Json;
use axum::extract::{Query, State};
use domain::{Uid, Vehicle, VehicleType};
use serde::{Deserialize, Serialize};

use super::PageQuery;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct VehiclesQuery {
    #[serde(flatten)]
    pub paging: PageQuery,
    #[serde(rename = "showAll")]
    pub show_all: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleResponse {
    pub vehicle_uid: Uid,
    pub brand: String,
    pub model: String,
    pub registration_number: String,
    pub power: u64,
    pub price: u64,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub available: bool,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            vehicle_uid: vehicle.uid,
            brand: vehicle.brand,
            model: vehicle.model,
            registration_number: vehicle.registration_number,
            power: vehicle.power,
            price: vehicle.price,
            vehicle_type: vehicle.vehicle_type,
            available: vehicle.available,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclesResponse {
    pub page: u64,
    pub page_size: u64,
    pub total_elements: u64,
    pub items: Vec<VehicleResponse>,
}

/// GET /api/v1/vehicles. Only available vehicles unless `showAll=true`.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<VehiclesResponse>, ApiError> {
    let page = query.paging.to_request()?;
    let show_all = query
        .show_all
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let vehicles = state.coordinator.list_vehicles(page, show_all).await;

    // An unbounded page reports its actual length as the size.
    let page_size = page
        .size()
        .unwrap_or(vehicles.items.len() as u64);

    Ok(Json(VehiclesResponse {
        page: page.page(),
        page_size,
        total_elements: vehicles.total_count,
        items: vehicles.items.into_iter().map(Into::into).collect(),
    }))
}
