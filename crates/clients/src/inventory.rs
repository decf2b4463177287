//! HTTP client for the vehicle inventory.

use std::sync::Arc;

use async_trait::async_trait;
use backlog::RetryQueue;
use domain::{Lookup, Page, PageRequest, Uid, Vehicle};
use reqwest::{Client, Method, StatusCode};
use saga::{InventoryApi, LockOutcome, Service, ServiceError, StatusChange};
use tracing::warn;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::dto::{ListDto, VehicleDto};
use crate::http::{Endpoint, Sent};

pub struct HttpInventory {
    endpoint: Endpoint,
    list_breaker: CircuitBreaker,
    get_breaker: CircuitBreaker,
}

impl HttpInventory {
    pub fn new(
        base_url: impl Into<String>,
        client: Client,
        backlog: Arc<dyn RetryQueue>,
        breaker: BreakerConfig,
    ) -> Self {
        Self {
            endpoint: Endpoint::new(Service::Inventory, base_url, client, backlog),
            list_breaker: CircuitBreaker::new("list_vehicles", breaker),
            get_breaker: CircuitBreaker::new("get_vehicle", breaker),
        }
    }

    async fn fetch_vehicles(
        &self,
        page: PageRequest,
        show_all: bool,
    ) -> Result<Page<Vehicle>, ServiceError> {
        let request = self
            .endpoint
            .request(Method::GET, "/api/v1/vehicles")
            .query(&[
                ("offset", page.offset().to_string()),
                ("limit", page.limit().to_string()),
                ("showAll", show_all.to_string()),
            ]);

        let reply = self.endpoint.send(request).await?;
        if !reply.is_success() {
            return Err(reply.rejected(Service::Inventory));
        }

        let list: ListDto<VehicleDto> = reply.json(Service::Inventory)?;
        Ok(Page::new(
            list.items.into_iter().map(Vehicle::from).collect(),
            list.count,
        ))
    }

    async fn fetch_vehicle(&self, uid: Uid) -> Result<Option<Vehicle>, ServiceError> {
        let request = self
            .endpoint
            .request(Method::GET, &format!("/api/v1/vehicles/{uid}"));

        let reply = self.endpoint.send(request).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let vehicle: VehicleDto = reply.json(Service::Inventory)?;
                Ok(Some(vehicle.into()))
            }
            _ => Err(reply.rejected(Service::Inventory)),
        }
    }
}

#[async_trait]
impl InventoryApi for HttpInventory {
    async fn list_vehicles(&self, page: PageRequest, show_all: bool) -> Page<Vehicle> {
        match self
            .list_breaker
            .call(|| self.fetch_vehicles(page, show_all))
            .await
        {
            Ok(vehicles) => vehicles,
            Err(e) => {
                warn!(error = %e, "Vehicle listing degraded to an empty page");
                Page::empty()
            }
        }
    }

    async fn get_vehicle(&self, uid: Uid) -> Lookup<Vehicle> {
        match self.get_breaker.call(|| self.fetch_vehicle(uid)).await {
            Ok(Some(vehicle)) => Lookup::Found(vehicle),
            Ok(None) => Lookup::Missing,
            Err(e) => {
                warn!(%uid, error = %e, "Vehicle lookup degraded to a placeholder");
                Lookup::Degraded(Vehicle::placeholder(uid))
            }
        }
    }

    async fn lock_vehicle(&self, uid: Uid) -> Result<LockOutcome, ServiceError> {
        let request = self
            .endpoint
            .request(Method::POST, &format!("/api/v1/vehicles/{uid}/lock"));

        let reply = match self.endpoint.send_write(request).await? {
            Sent::Answered(reply) => reply,
            Sent::Queued(cause) => return Err(cause),
        };

        match reply.status {
            StatusCode::NOT_FOUND => Ok(LockOutcome::NotFound),
            StatusCode::LOCKED => Ok(LockOutcome::AlreadyLocked),
            status if status.is_success() => {
                let vehicle: VehicleDto = reply.json(Service::Inventory)?;
                Ok(LockOutcome::Locked(vehicle.into()))
            }
            _ => Err(reply.rejected(Service::Inventory)),
        }
    }

    async fn unlock_vehicle(&self, uid: Uid) -> Result<StatusChange, ServiceError> {
        let request = self
            .endpoint
            .request(Method::DELETE, &format!("/api/v1/vehicles/{uid}/lock"));

        let reply = match self.endpoint.send_write(request).await? {
            Sent::Answered(reply) => reply,
            Sent::Queued(cause) => return Err(cause),
        };

        match reply.status {
            StatusCode::NOT_FOUND => Ok(StatusChange::NotFound),
            status if status.is_success() => Ok(StatusChange::Applied),
            _ => Err(reply.rejected(Service::Inventory)),
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.endpoint.health_check().await
    }
}
