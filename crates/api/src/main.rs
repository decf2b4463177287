//! Gateway entry point.

use std::sync::Arc;

use api::config::Config;
use api::signal::shutdown_signal;
use backlog::{BacklogProducer, PostgresTransport, RetryQueue};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    api::init_tracing(&config.log_level);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect the retry backlog
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to the backlog database");
    let transport = PostgresTransport::new(pool, config.backlog_topic.clone());
    transport
        .run_migrations()
        .await
        .expect("failed to migrate the backlog database");
    let backlog: Arc<dyn RetryQueue> = Arc::new(BacklogProducer::new(transport));

    // 4. Wire collaborators and build the application
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .expect("failed to build HTTP client");
    let state = api::AppState::over_http(&config, client, backlog);
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            match result {
                Ok(Ok(())) => tracing::info!("server stopped"),
                Ok(Err(e)) => tracing::error!(error = %e, "server error"),
                Err(e) => tracing::error!(error = %e, "server task failed"),
            }
            return;
        }
        () = shutdown_signal() => {}
    }

    // 6. Drain in-flight requests, bounded by the shutdown timeout
    let _ = stop_tx.send(());
    match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
        Ok(_) => tracing::info!("server shut down gracefully"),
        Err(_) => {
            tracing::warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "in-flight requests did not finish in time, aborting"
            );
            server.abort();
        }
    }
}
