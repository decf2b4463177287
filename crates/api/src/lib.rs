//! HTTP gateway for the rental orchestrator.
//!
//! Exposes vehicle listing and the rental sagas over REST, with structured
//! logging (tracing) and Prometheus metrics. The `retryer` binary in this
//! crate drains the retry backlog the gateway's clients write to.

pub mod config;
pub mod error;
pub mod routes;
pub mod signal;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use backlog::RetryQueue;
use clients::{HttpInventory, HttpLedger, HttpPayments};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::RentalCoordinator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Config;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RentalCoordinator,
    pub backlog: Arc<dyn RetryQueue>,
}

impl AppState {
    pub fn new(coordinator: RentalCoordinator, backlog: Arc<dyn RetryQueue>) -> Self {
        Self {
            coordinator,
            backlog,
        }
    }

    /// Wires the HTTP collaborator clients into a coordinator.
    pub fn over_http(config: &Config, client: reqwest::Client, backlog: Arc<dyn RetryQueue>) -> Self {
        let inventory = HttpInventory::new(
            config.inventory_url.clone(),
            client.clone(),
            backlog.clone(),
            config.breaker,
        );
        let ledger = HttpLedger::new(
            config.ledger_url.clone(),
            client.clone(),
            backlog.clone(),
            config.breaker,
        );
        let payments = HttpPayments::new(
            config.payment_url.clone(),
            client,
            backlog.clone(),
            config.breaker,
        );

        let coordinator =
            RentalCoordinator::new(Arc::new(inventory), Arc::new(ledger), Arc::new(payments))
                .with_request_timeout(config.request_timeout);

        Self::new(coordinator, backlog)
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/manage/health", get(routes::health::check))
        .route("/api/v1/vehicles", get(routes::vehicles::list))
        .route(
            "/api/v1/rental",
            get(routes::rentals::list).post(routes::rentals::start),
        )
        .route(
            "/api/v1/rental/{uid}",
            get(routes::rentals::get).delete(routes::rentals::cancel),
        )
        .route("/api/v1/rental/{uid}/finish", post(routes::rentals::finish))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Installs the fmt subscriber, filtered by `RUST_LOG` or `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
