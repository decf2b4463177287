//! HTTP client for the payment collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use backlog::RetryQueue;
use domain::{Lookup, Payment, PaymentStatus, Uid};
use reqwest::{Client, Method, StatusCode};
use saga::{PaymentApi, Service, ServiceError, StatusChange};
use tracing::warn;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::dto::PaymentDto;
use crate::http::{Endpoint, Sent};

pub struct HttpPayments {
    endpoint: Endpoint,
    get_breaker: CircuitBreaker,
}

impl HttpPayments {
    pub fn new(
        base_url: impl Into<String>,
        client: Client,
        backlog: Arc<dyn RetryQueue>,
        breaker: BreakerConfig,
    ) -> Self {
        Self {
            endpoint: Endpoint::new(Service::Payment, base_url, client, backlog),
            get_breaker: CircuitBreaker::new("get_payment", breaker),
        }
    }

    async fn fetch_payment(&self, uid: Uid) -> Result<Option<Payment>, ServiceError> {
        let request = self
            .endpoint
            .request(Method::GET, &format!("/api/v1/payments/{uid}"));

        let reply = self.endpoint.send(request).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let payment: PaymentDto = reply.json(Service::Payment)?;
                Ok(Some(payment.into()))
            }
            _ => Err(reply.rejected(Service::Payment)),
        }
    }
}

#[async_trait]
impl PaymentApi for HttpPayments {
    async fn create_payment(&self, price: u64) -> Result<Payment, ServiceError> {
        let request = self
            .endpoint
            .request(Method::POST, "/api/v1/payments")
            .query(&[("price", price)]);

        let reply = match self.endpoint.send_write(request).await? {
            Sent::Answered(reply) => reply,
            Sent::Queued(cause) => return Err(cause),
        };

        if !reply.is_success() {
            return Err(reply.rejected(Service::Payment));
        }
        let payment: PaymentDto = reply.json(Service::Payment)?;
        Ok(payment.into())
    }

    async fn get_payment(&self, uid: Uid) -> Lookup<Payment> {
        match self.get_breaker.call(|| self.fetch_payment(uid)).await {
            Ok(Some(payment)) => Lookup::Found(payment),
            Ok(None) => Lookup::Missing,
            Err(e) => {
                warn!(%uid, error = %e, "Payment lookup degraded to a placeholder");
                Lookup::Degraded(Payment::placeholder(uid))
            }
        }
    }

    async fn set_payment_status(
        &self,
        uid: Uid,
        status: PaymentStatus,
    ) -> Result<StatusChange, ServiceError> {
        let request = self
            .endpoint
            .request(Method::PUT, &format!("/api/v1/payments/{uid}/status"))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(status.as_str());

        let reply = match self.endpoint.send_write(request).await? {
            Sent::Answered(reply) => reply,
            Sent::Queued(_) => return Ok(StatusChange::Queued),
        };

        match reply.status {
            StatusCode::NOT_FOUND => Ok(StatusChange::NotFound),
            status if status.is_success() => Ok(StatusChange::Applied),
            _ => Err(reply.rejected(Service::Payment)),
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.endpoint.health_check().await
    }
}
