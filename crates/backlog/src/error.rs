use thiserror::Error;
use uuid::Uuid;

use crate::transport::Position;

/// Errors raised by the retry backlog.
#[derive(Debug, Error)]
pub enum BacklogError {
    /// The backing stream does not exist yet.
    #[error("backlog topic '{0}' is not provisioned")]
    TopicNotReady(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A message payload could not be decoded and was skipped.
    #[error("malformed backlog message {key} at position {position} skipped: {reason}")]
    Malformed {
        key: Uuid,
        position: Position,
        reason: String,
    },

    /// Replaying a message failed; the cursor was rewound onto it.
    #[error("replay of backlog message {key} failed: {reason}")]
    ReplayFailed { key: Uuid, reason: String },

    /// Replaying a message failed and the cursor could not be rewound either.
    #[error(
        "replay of backlog message {key} failed: {reason}; rewind to position {position} failed: {source}"
    )]
    RewindFailed {
        key: Uuid,
        reason: String,
        position: Position,
        #[source]
        source: Box<BacklogError>,
    },
}

/// Result type for backlog operations.
pub type Result<T> = std::result::Result<T, BacklogError>;
