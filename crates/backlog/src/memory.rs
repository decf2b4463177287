use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::{BacklogError, BacklogMessage, BacklogTransport, Position, Result};

const TOPIC: &str = "in-memory";

struct Inner {
    log: RwLock<Vec<BacklogMessage>>,
    cursor: Mutex<usize>,
    wakeup: Notify,
    provisioned: AtomicBool,
}

/// In-memory backlog transport for testing and single-process runs.
///
/// Producer and consumer handles obtained by cloning share one log and one
/// cursor, mirroring how the PostgreSQL transport behaves across processes.
#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::with_provisioning(true)
    }
}

impl InMemoryTransport {
    /// Creates a new empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose appends fail with `TopicNotReady` until
    /// [`provision`](Self::provision) is called.
    pub fn unprovisioned() -> Self {
        Self::with_provisioning(false)
    }

    fn with_provisioning(provisioned: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                log: RwLock::new(Vec::new()),
                cursor: Mutex::new(0),
                wakeup: Notify::new(),
                provisioned: AtomicBool::new(provisioned),
            }),
        }
    }

    pub fn provision(&self) {
        self.inner.provisioned.store(true, Ordering::SeqCst);
    }

    /// Returns the total number of messages ever appended.
    pub async fn len(&self) -> usize {
        self.inner.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns the number of messages at or after the cursor.
    pub async fn pending(&self) -> usize {
        let log = self.inner.log.read().await;
        let cursor = self.inner.cursor.lock().await;
        log.len().saturating_sub(*cursor)
    }

    /// Returns a copy of every message appended so far.
    pub async fn messages(&self) -> Vec<BacklogMessage> {
        self.inner.log.read().await.clone()
    }
}

#[async_trait]
impl BacklogTransport for InMemoryTransport {
    async fn append(&self, key: Uuid, payload: Vec<u8>) -> Result<Position> {
        if !self.inner.provisioned.load(Ordering::SeqCst) {
            return Err(BacklogError::TopicNotReady(TOPIC.to_string()));
        }

        let position = {
            let mut log = self.inner.log.write().await;
            let position = log.len() as Position;
            log.push(BacklogMessage {
                position,
                key,
                payload,
                enqueued_at: Utc::now(),
            });
            position
        };

        self.inner.wakeup.notify_waiters();
        Ok(position)
    }

    async fn next_message(&self) -> Result<BacklogMessage> {
        loop {
            // Register interest before checking so an append racing with the
            // check still wakes us.
            let notified = self.inner.wakeup.notified();
            {
                let log = self.inner.log.read().await;
                let mut cursor = self.inner.cursor.lock().await;
                if let Some(message) = log.get(*cursor) {
                    *cursor += 1;
                    return Ok(message.clone());
                }
            }
            notified.await;
        }
    }

    async fn seek(&self, position: Position) -> Result<()> {
        *self.inner.cursor.lock().await = usize::try_from(position).unwrap_or(0);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn messages_are_read_in_append_order() {
        let transport = InMemoryTransport::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        transport.append(first, b"a".to_vec()).await.unwrap();
        transport.append(second, b"b".to_vec()).await.unwrap();

        assert_eq!(transport.next_message().await.unwrap().key, first);
        assert_eq!(transport.next_message().await.unwrap().key, second);
        assert_eq!(transport.pending().await, 0);
    }

    #[tokio::test]
    async fn seek_rewinds_onto_an_earlier_message() {
        let transport = InMemoryTransport::new();
        let key = Uuid::new_v4();
        transport.append(key, b"a".to_vec()).await.unwrap();

        let message = transport.next_message().await.unwrap();
        transport.seek(message.position).await.unwrap();

        assert_eq!(transport.pending().await, 1);
        assert_eq!(transport.next_message().await.unwrap(), message);
    }

    #[tokio::test]
    async fn reader_blocks_until_a_message_arrives() {
        let transport = InMemoryTransport::new();
        let reader = transport.clone();
        let handle = tokio::spawn(async move { reader.next_message().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        let key = Uuid::new_v4();
        transport.append(key, b"late".to_vec()).await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(message.key, key);
    }

    #[tokio::test]
    async fn unprovisioned_topic_rejects_appends() {
        let transport = InMemoryTransport::unprovisioned();
        let err = transport.append(Uuid::new_v4(), vec![]).await.unwrap_err();
        assert!(matches!(err, BacklogError::TopicNotReady(_)));

        transport.provision();
        transport.append(Uuid::new_v4(), vec![]).await.unwrap();
        assert_eq!(transport.len().await, 1);
    }
}
