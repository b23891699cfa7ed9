//! Recipe similarity and recommendation service.
//!
//! HTTP front of the `scoring` crate. Duplicate checks and rankings are computed per request,
//! interactions go through a queue to the training worker, and everything stateful lives in
//! Redis.
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | `/health` | liveness |
//! | POST | `/similarity` | duplicate check for a new or edited recipe |
//! | POST | `/interactions` | record a view/like/save, answered with 202 |
//! | POST | `/recommendations` | rank a candidate pool for a user |
//! | GET | `/users/{user_id}/weights` | current weights per interaction type |
//! | GET | `/users/{user_id}/metrics` | training history |
//! | PUT | `/recipes` | load recipes into the duplicate-check pool |
//!
//!
//!
//! # Degrading
//!
//! - Duplicate checks fail closed: a pool that can't be read is a 503 the client retries,
//!   unless `DUPLICATE_CHECK_FAIL_OPEN` is set
//! - Recommendations never fail on storage, they fall back to the non-personalized ranking and
//!   say so with `personalized: false` and a `fallback_reason`
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=info cargo run -p server
//! ```
//!
//! Run with no database at all.
//! ```sh
//! STORE=memory RUST_LOG=debug cargo run -p server
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod state;
pub mod training;
pub mod utils;

use config::Config;
use routes::{
    health_handler, interactions_handler, metrics_handler, recipes_handler,
    recommendations_handler, similarity_handler, weights_handler,
};
use state::State;
use training::spawn_worker;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/similarity", post(similarity_handler))
        .route("/interactions", post(interactions_handler))
        .route("/recommendations", post(recommendations_handler))
        .route("/users/{user_id}/weights", get(weights_handler))
        .route("/users/{user_id}/metrics", get(metrics_handler))
        .route("/recipes", put(recipes_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let (state, receiver) = State::new(config).await?;
    let worker = spawn_worker(state.trainer.clone(), receiver);

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down, draining training queue...");

    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Training queue not drained after {WORKER_DRAIN_TIMEOUT:?}, dropping the rest");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
