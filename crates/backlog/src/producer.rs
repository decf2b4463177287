use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{BacklogError, BacklogRequest, BacklogTransport, Result};

/// Wait before the single retry of an append to an unprovisioned topic.
pub const DEFAULT_TOPIC_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Write side of the backlog as seen by the collaborator clients.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Stores a request for later delivery and returns its key.
    async fn push(&self, request: BacklogRequest) -> Result<Uuid>;

    /// Reports whether the backlog can currently accept requests.
    async fn health_check(&self) -> Result<()>;
}

/// Appends requests to a [`BacklogTransport`].
#[derive(Clone)]
pub struct BacklogProducer<T> {
    transport: T,
    topic_retry_delay: Duration,
}

impl<T: BacklogTransport> BacklogProducer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            topic_retry_delay: DEFAULT_TOPIC_RETRY_DELAY,
        }
    }

    pub fn with_topic_retry_delay(mut self, delay: Duration) -> Self {
        self.topic_retry_delay = delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: BacklogTransport> RetryQueue for BacklogProducer<T> {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn push(&self, request: BacklogRequest) -> Result<Uuid> {
        let key = Uuid::new_v4();
        let payload = request.encode()?;

        let position = match self.transport.append(key, payload.clone()).await {
            Err(BacklogError::TopicNotReady(topic)) => {
                warn!(
                    topic = %topic,
                    delay_ms = self.topic_retry_delay.as_millis() as u64,
                    "Backlog topic not ready, retrying append once"
                );
                tokio::time::sleep(self.topic_retry_delay).await;
                self.transport.append(key, payload).await?
            }
            other => other?,
        };

        counter!("backlog_pushed_total").increment(1);
        debug!(%key, position, "Request queued for replay");
        Ok(key)
    }

    async fn health_check(&self) -> Result<()> {
        self.transport.health_check().await
    }
}
