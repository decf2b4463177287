//! Delivery of queued requests for the backlog consumer.

use backlog::BacklogRequest;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a queued request has to stay at the head of the backlog.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid method '{0}'")]
    InvalidMethod(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collaborator answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// Sends a queued request again.
///
/// Any answer below 500 counts as delivered, including 4xx: the collaborator
/// was reached and made a decision, and sending the request again would not
/// change it.
///
/// # Errors
///
/// Fails on transport errors and 5xx answers so the consumer rewinds onto the
/// same message.
#[tracing::instrument(skip(client, request), fields(method = %request.method, url = %request.url))]
pub async fn replay(client: &Client, request: BacklogRequest) -> Result<(), ReplayError> {
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|_| ReplayError::InvalidMethod(request.method.clone()))?;

    let mut builder = client.request(method, &request.url).body(request.body);
    for (name, values) in &request.headers {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    let response = builder.send().await?;
    let status = response.status();

    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Replay rejected by collaborator");
        return Err(ReplayError::Status {
            status: status.as_u16(),
            body,
        });
    }

    if !status.is_success() {
        warn!(
            status = status.as_u16(),
            "Replayed request was refused; treating it as delivered"
        );
    } else {
        debug!(status = status.as_u16(), "Replayed request delivered");
    }
    Ok(())
}
