//! Request plumbing shared by the collaborator clients.

use std::sync::Arc;

use backlog::{BacklogRequest, RetryQueue};
use reqwest::{Client, Request, RequestBuilder, StatusCode};
use saga::{Service, ServiceError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Base URL, HTTP client, and backlog for one collaborator.
#[derive(Clone)]
pub(crate) struct Endpoint {
    service: Service,
    base_url: String,
    client: Client,
    backlog: Arc<dyn RetryQueue>,
}

/// A response whose body has been read in full.
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Outcome of a write call.
pub(crate) enum Sent {
    Answered(Reply),
    /// The collaborator was unreachable and the request was queued.
    Queued(ServiceError),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self, service: Service) -> Result<T, ServiceError> {
        serde_json::from_slice(&self.body).map_err(|e| ServiceError::Decode {
            service,
            reason: e.to_string(),
        })
    }

    /// Turns an unexpected status into a rejection, preferring the `message`
    /// field of a JSON error body.
    pub fn rejected(&self, service: Service) -> ServiceError {
        let message = match serde_json::from_slice::<ErrorBody>(&self.body) {
            Ok(body) => body.message,
            Err(_) => String::from_utf8_lossy(&self.body).into_owned(),
        };
        ServiceError::Rejected {
            service,
            status: self.status.as_u16(),
            message,
        }
    }
}

impl Endpoint {
    pub fn new(
        service: Service,
        base_url: impl Into<String>,
        client: Client,
        backlog: Arc<dyn RetryQueue>,
    ) -> Self {
        Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            backlog,
        }
    }

    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{path}", self.base_url))
    }

    /// Sends a read request. Nothing is queued on failure.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Reply, ServiceError> {
        let request = builder.build().map_err(|e| self.transport(e))?;
        match self.client.execute(request).await {
            Ok(response) => self.read(response).await,
            Err(e) if e.is_connect() => Err(self.unavailable(e)),
            Err(e) => Err(self.transport(e)),
        }
    }

    /// Sends a write request, queueing a copy of it when the collaborator
    /// cannot be reached.
    ///
    /// # Errors
    ///
    /// Fails when the exchange breaks down after the collaborator was reached,
    /// or with `ServiceError::NotQueued` when queueing fails too.
    pub async fn send_write(&self, builder: RequestBuilder) -> Result<Sent, ServiceError> {
        let request = builder.build().map_err(|e| self.transport(e))?;
        let snapshot = capture(&request);

        match self.client.execute(request).await {
            Ok(response) => Ok(Sent::Answered(self.read(response).await?)),
            Err(e) if e.is_connect() => {
                let cause = self.unavailable(e);
                match self.backlog.push(snapshot).await {
                    Ok(key) => {
                        warn!(service = %self.service, %key, error = %cause, "Request queued for retry");
                        Ok(Sent::Queued(cause))
                    }
                    Err(backlog) => Err(ServiceError::NotQueued {
                        cause: Box::new(cause),
                        backlog,
                    }),
                }
            }
            Err(e) => Err(self.transport(e)),
        }
    }

    /// Probes `/manage/health` and the backlog. Both must answer.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        let reply = self
            .send(self.request(reqwest::Method::GET, "/manage/health"))
            .await?;
        if !reply.is_success() {
            return Err(reply.rejected(self.service));
        }

        self.backlog
            .health_check()
            .await
            .map_err(|e| ServiceError::Unavailable {
                service: self.service,
                reason: format!("backlog: {e}"),
            })
    }

    async fn read(&self, response: reqwest::Response) -> Result<Reply, ServiceError> {
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport(e))?;
        Ok(Reply {
            status,
            body: body.to_vec(),
        })
    }

    fn unavailable(&self, error: reqwest::Error) -> ServiceError {
        ServiceError::Unavailable {
            service: self.service,
            reason: error.to_string(),
        }
    }

    fn transport(&self, error: reqwest::Error) -> ServiceError {
        ServiceError::Transport {
            service: self.service,
            reason: error.to_string(),
        }
    }
}

/// Copies a built request into a backlog envelope.
pub(crate) fn capture(request: &Request) -> BacklogRequest {
    let body = request
        .body()
        .and_then(|body| body.as_bytes())
        .map(<[u8]>::to_vec)
        .unwrap_or_default();

    let mut captured =
        BacklogRequest::new(request.method().as_str(), request.url().as_str()).with_body(body);
    for (name, value) in request.headers() {
        match value.to_str() {
            Ok(value) => captured = captured.with_header(name.as_str(), value),
            Err(_) => warn!(header = %name, "Dropping non-text header from queued request"),
        }
    }
    captured
}
