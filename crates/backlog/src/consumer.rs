use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{BacklogError, BacklogMessage, BacklogRequest, BacklogTransport, Result};

/// Pause after a failed replay before the head message is tried again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A received message together with the request decoded from it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: BacklogMessage,
    pub request: BacklogRequest,
}

/// Single reader of the backlog stream.
///
/// Messages are replayed one at a time through a caller-supplied executor.
/// When the executor fails the cursor is moved back onto the same message, so
/// the next call sees it again and nothing behind it is attempted meanwhile.
pub struct BacklogConsumer<T> {
    transport: T,
    retry_delay: Duration,
}

impl<T: BacklogTransport> BacklogConsumer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Waits for the next message and decodes it.
    ///
    /// A payload that cannot be decoded is skipped: the cursor already points
    /// past it and a `Malformed` error is returned.
    pub async fn receive(&self) -> Result<Delivery> {
        let message = self.transport.next_message().await?;

        match BacklogRequest::decode(&message.payload) {
            Ok(request) => Ok(Delivery { message, request }),
            Err(e) => {
                counter!("backlog_malformed_total").increment(1);
                error!(
                    key = %message.key,
                    position = message.position,
                    error = %e,
                    "Skipping undecodable backlog message"
                );
                Err(BacklogError::Malformed {
                    key: message.key,
                    position: message.position,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Replays a delivery, rewinding onto it if the executor fails.
    pub async fn process<F, Fut, E>(&self, delivery: Delivery, executor: F) -> Result<Uuid>
    where
        F: FnOnce(BacklogRequest) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Display,
    {
        let Delivery { message, request } = delivery;
        let method = request.method.clone();
        let url = request.url.clone();

        match executor(request).await {
            Ok(()) => {
                counter!("backlog_replayed_total").increment(1);
                info!(key = %message.key, %method, %url, "Backlog request delivered");
                Ok(message.key)
            }
            Err(e) => {
                counter!("backlog_replay_failures_total").increment(1);
                let reason = e.to_string();

                if let Err(rewind) = self.transport.seek(message.position).await {
                    return Err(BacklogError::RewindFailed {
                        key: message.key,
                        reason,
                        position: message.position,
                        source: Box::new(rewind),
                    });
                }

                Err(BacklogError::ReplayFailed {
                    key: message.key,
                    reason,
                })
            }
        }
    }

    /// Receives one message and replays it.
    pub async fn handle_request<F, Fut, E>(&self, executor: F) -> Result<Uuid>
    where
        F: FnOnce(BacklogRequest) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Display,
    {
        let delivery = self.receive().await?;
        self.process(delivery, executor).await
    }

    /// Replays messages until `shutdown` resolves.
    ///
    /// Shutdown is only observed while waiting for a message or pausing after
    /// a failure; a replay that has started always runs to completion.
    pub async fn run_until<S, F, Fut, E>(&self, shutdown: S, mut executor: F)
    where
        S: Future<Output = ()>,
        F: FnMut(BacklogRequest) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Display,
    {
        tokio::pin!(shutdown);

        loop {
            let received = tokio::select! {
                _ = &mut shutdown => break,
                received = self.receive() => received,
            };

            let outcome = match received {
                Ok(delivery) => self.process(delivery, &mut executor).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(key) => debug!(%key, "Backlog message processed"),
                Err(BacklogError::Malformed { .. }) => continue,
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "Backlog replay failed"
                    );
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!("Backlog consumer stopped");
    }
}
