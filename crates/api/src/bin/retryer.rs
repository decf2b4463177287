//! Retryer entry point: replays queued collaborator writes in order.

use api::config::Config;
use api::signal::shutdown_signal;
use backlog::{BacklogConsumer, PostgresTransport};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    api::init_tracing(&config.log_level);

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to the backlog database");
    let transport = PostgresTransport::new(pool, config.backlog_topic.clone())
        .with_poll_interval(config.backlog_poll_interval);
    transport
        .run_migrations()
        .await
        .expect("failed to migrate the backlog database");

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .expect("failed to build HTTP client");
    let consumer = BacklogConsumer::new(transport).with_retry_delay(config.retry_delay);

    tracing::info!(topic = %config.backlog_topic, "starting retryer");
    consumer
        .run_until(shutdown_signal(), |request| {
            let client = client.clone();
            async move { clients::replay(&client, request).await }
        })
        .await;

    tracing::info!("retryer stopped");
}
