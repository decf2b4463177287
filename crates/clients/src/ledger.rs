//! HTTP client for the rental ledger.

use std::sync::Arc;

use async_trait::async_trait;
use backlog::RetryQueue;
use domain::{Page, PageRequest, Rental, RentalLookup, RentalProperties, RentalStatus, Uid};
use reqwest::{Client, Method, StatusCode};
use saga::{LedgerApi, Service, ServiceError, StatusChange};
use tracing::warn;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::dto::{ListDto, RentalDto, RentalPropertiesDto};
use crate::http::{Endpoint, Reply, Sent};

/// Header carrying the name of the rental owner.
pub const USER_HEADER: &str = "X-User-Name";

pub struct HttpLedger {
    endpoint: Endpoint,
    list_breaker: CircuitBreaker,
    get_breaker: CircuitBreaker,
}

enum Fetched {
    Found(Rental),
    Missing,
    Forbidden,
}

fn decode_rental(reply: &Reply) -> Result<Rental, ServiceError> {
    let dto: RentalDto = reply.json(Service::Ledger)?;
    Rental::try_from(dto).map_err(|e| ServiceError::Decode {
        service: Service::Ledger,
        reason: e.to_string(),
    })
}

impl HttpLedger {
    pub fn new(
        base_url: impl Into<String>,
        client: Client,
        backlog: Arc<dyn RetryQueue>,
        breaker: BreakerConfig,
    ) -> Self {
        Self {
            endpoint: Endpoint::new(Service::Ledger, base_url, client, backlog),
            list_breaker: CircuitBreaker::new("list_rentals", breaker),
            get_breaker: CircuitBreaker::new("get_rental", breaker),
        }
    }

    async fn fetch_rentals(
        &self,
        owner: &str,
        page: PageRequest,
    ) -> Result<Page<Rental>, ServiceError> {
        let request = self
            .endpoint
            .request(Method::GET, "/api/v1/rentals")
            .header(USER_HEADER, owner)
            .query(&[
                ("offset", page.offset().to_string()),
                ("limit", page.limit().to_string()),
            ]);

        let reply = self.endpoint.send(request).await?;
        if !reply.is_success() {
            return Err(reply.rejected(Service::Ledger));
        }

        let list: ListDto<RentalDto> = reply.json(Service::Ledger)?;
        let rentals = list
            .items
            .into_iter()
            .map(Rental::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServiceError::Decode {
                service: Service::Ledger,
                reason: e.to_string(),
            })?;
        Ok(Page::new(rentals, list.count))
    }

    async fn fetch_rental(&self, uid: Uid, owner: &str) -> Result<Fetched, ServiceError> {
        let request = self
            .endpoint
            .request(Method::GET, &format!("/api/v1/rentals/{uid}"))
            .header(USER_HEADER, owner);

        let reply = self.endpoint.send(request).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Ok(Fetched::Missing),
            StatusCode::FORBIDDEN => Ok(Fetched::Forbidden),
            status if status.is_success() => Ok(Fetched::Found(decode_rental(&reply)?)),
            _ => Err(reply.rejected(Service::Ledger)),
        }
    }
}

#[async_trait]
impl LedgerApi for HttpLedger {
    async fn list_rentals(&self, owner: &str, page: PageRequest) -> Page<Rental> {
        match self
            .list_breaker
            .call(|| self.fetch_rentals(owner, page))
            .await
        {
            Ok(rentals) => rentals,
            Err(e) => {
                warn!(owner, error = %e, "Rental listing degraded to an empty page");
                Page::empty()
            }
        }
    }

    async fn get_rental(&self, uid: Uid, owner: &str) -> RentalLookup {
        match self.get_breaker.call(|| self.fetch_rental(uid, owner)).await {
            Ok(Fetched::Found(rental)) if rental.belongs_to(owner) => RentalLookup::Found(rental),
            Ok(Fetched::Found(_)) | Ok(Fetched::Forbidden) => RentalLookup::Forbidden,
            Ok(Fetched::Missing) => RentalLookup::Missing,
            Err(e) => {
                warn!(%uid, owner, error = %e, "Rental lookup degraded to a placeholder");
                RentalLookup::Degraded(Rental::placeholder(uid, owner))
            }
        }
    }

    async fn create_rental(&self, properties: RentalProperties) -> Result<Rental, ServiceError> {
        let request = self
            .endpoint
            .request(Method::POST, "/api/v1/rentals")
            .header(USER_HEADER, properties.owner.as_str())
            .json(&RentalPropertiesDto::from(&properties));

        let reply = match self.endpoint.send_write(request).await? {
            Sent::Answered(reply) => reply,
            Sent::Queued(cause) => return Err(cause),
        };

        if !reply.is_success() {
            return Err(reply.rejected(Service::Ledger));
        }
        decode_rental(&reply)
    }

    async fn set_rental_status(
        &self,
        uid: Uid,
        status: RentalStatus,
    ) -> Result<StatusChange, ServiceError> {
        let request = self
            .endpoint
            .request(Method::PUT, &format!("/api/v1/rentals/{uid}/status"))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(status.as_str());

        let reply = match self.endpoint.send_write(request).await? {
            Sent::Answered(reply) => reply,
            Sent::Queued(_) => return Ok(StatusChange::Queued),
        };

        match reply.status {
            StatusCode::NOT_FOUND => Ok(StatusChange::NotFound),
            status if status.is_success() => Ok(StatusChange::Applied),
            _ => Err(reply.rejected(Service::Ledger)),
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.endpoint.health_check().await
    }
}
