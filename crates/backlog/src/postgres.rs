use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{BacklogError, BacklogMessage, BacklogTransport, Position, Result};

/// SQLSTATE for "relation does not exist".
const UNDEFINED_TABLE: &str = "42P01";

const DEFAULT_CONSUMER: &str = "retryer";

/// PostgreSQL-backed backlog transport.
///
/// Messages live in `backlog_messages`, ordered by a sequence per topic. The
/// read cursor of each consumer is a row in `backlog_cursors`, so a restarted
/// consumer resumes where the previous one stopped.
#[derive(Clone)]
pub struct PostgresTransport {
    pool: PgPool,
    topic: String,
    consumer: String,
    poll_interval: Duration,
}

impl PostgresTransport {
    /// Creates a transport for the given topic.
    pub fn new(pool: PgPool, topic: impl Into<String>) -> Self {
        Self {
            pool,
            topic: topic.into(),
            consumer: DEFAULT_CONSUMER.to_string(),
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Sets the name under which the read cursor is stored.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    /// Sets how long `next_message` sleeps when the stream is drained.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Returns the number of messages at or after the cursor.
    pub async fn pending(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM backlog_messages m
            WHERE m.topic = $1
              AND m.position >= COALESCE(
                  (SELECT next_position FROM backlog_cursors WHERE topic = $1 AND consumer = $2),
                  0)
            "#,
        )
        .bind(&self.topic)
        .bind(&self.consumer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| self.classify(e))?;

        Ok(count.unsigned_abs())
    }

    fn classify(&self, err: sqlx::Error) -> BacklogError {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.code().as_deref() == Some(UNDEFINED_TABLE)
        {
            return BacklogError::TopicNotReady(self.topic.clone());
        }
        BacklogError::Database(err)
    }

    fn row_to_message(row: PgRow) -> Result<BacklogMessage> {
        Ok(BacklogMessage {
            position: row.try_get("position")?,
            key: row.try_get::<Uuid, _>("key")?,
            payload: row.try_get("payload")?,
            enqueued_at: row.try_get("enqueued_at")?,
        })
    }

    async fn try_next(&self) -> Result<Option<BacklogMessage>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO backlog_cursors (topic, consumer)
            VALUES ($1, $2)
            ON CONFLICT (topic, consumer) DO NOTHING
            "#,
        )
        .bind(&self.topic)
        .bind(&self.consumer)
        .execute(&mut *tx)
        .await
        .map_err(|e| self.classify(e))?;

        let cursor: i64 = sqlx::query_scalar(
            "SELECT next_position FROM backlog_cursors WHERE topic = $1 AND consumer = $2 FOR UPDATE",
        )
        .bind(&self.topic)
        .bind(&self.consumer)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| self.classify(e))?;

        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT position, key, payload, enqueued_at
            FROM backlog_messages
            WHERE topic = $1 AND position >= $2
            ORDER BY position ASC
            LIMIT 1
            "#,
        )
        .bind(&self.topic)
        .bind(cursor)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| self.classify(e))?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let message = Self::row_to_message(row)?;

        sqlx::query(
            r#"
            UPDATE backlog_cursors
            SET next_position = $3, updated_at = now()
            WHERE topic = $1 AND consumer = $2
            "#,
        )
        .bind(&self.topic)
        .bind(&self.consumer)
        .bind(message.position + 1)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(message))
    }
}

#[async_trait]
impl BacklogTransport for PostgresTransport {
    async fn append(&self, key: Uuid, payload: Vec<u8>) -> Result<Position> {
        let mut tx = self.pool.begin().await?;

        // Writers on one topic take turns so sequence order matches commit
        // order; otherwise the reader could pass a position that commits later.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.topic)
            .execute(&mut *tx)
            .await?;

        let position: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO backlog_messages (topic, key, payload)
            VALUES ($1, $2, $3)
            RETURNING position
            "#,
        )
        .bind(&self.topic)
        .bind(key)
        .bind(payload)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| self.classify(e))?;

        tx.commit().await?;
        Ok(position)
    }

    async fn next_message(&self) -> Result<BacklogMessage> {
        loop {
            if let Some(message) = self.try_next().await? {
                return Ok(message);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn seek(&self, position: Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backlog_cursors (topic, consumer, next_position)
            VALUES ($1, $2, $3)
            ON CONFLICT (topic, consumer) DO UPDATE SET
                next_position = EXCLUDED.next_position,
                updated_at = now()
            "#,
        )
        .bind(&self.topic)
        .bind(&self.consumer)
        .bind(position)
        .execute(&self.pool)
        .await
        .map_err(|e| self.classify(e))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
