use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use super::{
    services::{health, method_not_allowed, submit_job},
    state::AppState,
};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Routes of the gateway, with gzip request decompression and the
/// configured per-request timeout.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/uop", post(submit_job).fallback(method_not_allowed))
        .route("/health", get(health))
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        // Content-Encoding: gzip bodies are inflated before handlers see them
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address: SocketAddr, state: AppState) -> Result<(), AnyError> {
    let operations = state.registry.operations();
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, ?operations, "fopgate listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
