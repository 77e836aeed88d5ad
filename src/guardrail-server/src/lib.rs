//! Guardrail hook/event ingestor (C8): exposes the coding-agent hook API
//! (`pre-tool-use`, `post-tool-use`, `user-prompt`, `stop`), the human
//! approval side-channel, a read-only event query API, health/metrics,
//! and the in-process streaming gateway ingestor — all driving the
//! `guardrail-core` safeguard orchestrator and approval coordinator.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod approvals;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod hooks;
pub mod state;
pub mod streaming;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::GuardrailConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server until it receives ctrl-c.
pub async fn run(config: GuardrailConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: GuardrailConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if !config.blocking_enabled {
        warn!("guardrail running in monitor mode (BLOCKING_ENABLED=false): hooks will always allow");
    }

    let addr: SocketAddr = config.listen_addr.parse()?;
    let state = Arc::new(AppState::new(config).await?);
    state.spawn_cleanup_task();
    let app = create_router_with_state(Arc::clone(&state));

    info!("guardrail server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!("guardrail server shutting down, orphaning any pending approvals...");
    state.approvals.orphan_all_pending().await;

    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let routes = hooks::routes().merge(approvals::routes()).merge(events::routes()).merge(health::routes());

    Router::new()
        .nest("/api/v1", routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
