use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;

/// Offset of a message within its stream.
pub type Position = i64;

/// A message as stored in the backlog stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogMessage {
    pub position: Position,
    pub key: Uuid,
    pub payload: Vec<u8>,
    pub enqueued_at: DateTime<Utc>,
}

/// Ordered, durable stream with a single read cursor.
///
/// Appends may come from many writers concurrently; the reader sees them in
/// one total order. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait BacklogTransport: Send + Sync {
    /// Appends a payload under a unique key and returns its position.
    ///
    /// Fails with `TopicNotReady` if the stream has not been provisioned.
    async fn append(&self, key: Uuid, payload: Vec<u8>) -> Result<Position>;

    /// Waits until a message exists at the cursor, then moves the cursor past
    /// it and returns it.
    async fn next_message(&self) -> Result<BacklogMessage>;

    /// Moves the cursor so the next read returns the message at `position`.
    async fn seek(&self, position: Position) -> Result<()>;

    /// Reports whether the stream is reachable.
    async fn health_check(&self) -> Result<()>;
}
