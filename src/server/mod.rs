//! HTTP replay server.
//!
//! Every connection gets its own run: the recorded events are pushed through
//! a fresh sequencer and streamed to that client, so each client sees the
//! validated stream from `RUN_STARTED` to its terminal event.
//!
//! ```text
//! recorded events
//!     ↓ drive_with_policy (one sequencer per connection)
//! EventSender ── bounded channel ──> SseHandler / WsHandler
//!     ↓
//! client
//! ```

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agui_core::sequencer::ViolationPolicy;
use agui_core::Event;
use agui_server::WsConfig;
use axum::{Router, routing::get};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::CorsLayer;

use crate::config::{AgUiConfig, SecurityMode};
use crate::error::{CliError, Result};

/// Shared state for the replay routes.
#[derive(Clone)]
pub struct ReplayState {
    events: Arc<Vec<Event>>,
    policy: ViolationPolicy,
    buffer: usize,
    delay: Duration,
    ws: WsConfig,
}

impl ReplayState {
    pub fn new(events: Vec<Event>, config: &AgUiConfig) -> Self {
        Self {
            events: Arc::new(events),
            policy: config.sequencer.policy,
            buffer: config.buffer.max(1),
            delay: Duration::from_millis(config.replay_delay_ms),
            ws: config.ws.to_ws_config(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Serves one recorded stream over SSE and WebSocket.
pub struct ReplayServer {
    config: AgUiConfig,
    state: ReplayState,
}

impl ReplayServer {
    pub fn new(config: AgUiConfig, events: Vec<Event>) -> Self {
        let state = ReplayState::new(events, &config);
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Returns the address the server will listen on.
    pub fn addr(&self) -> String {
        self.config.addr()
    }

    /// Runs until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let mode = self.config.security.resolve()?;
        let addr = lookup(&self.addr()).await?;
        let handle = Handle::new();
        tokio::spawn(shutdown_on_ctrl_c(handle.clone()));
        self.serve(addr, mode, handle).await
    }

    /// Serves on `addr` until `handle` shuts the server down.
    pub async fn serve(self, addr: SocketAddr, mode: SecurityMode, handle: Handle) -> Result<()> {
        let app = self.router().into_make_service();
        let events = self.state.event_count();
        let policy = self.state.policy;

        match mode {
            SecurityMode::Insecure => {
                tokio::spawn(announce(handle.clone(), "http", events, policy));
                axum_server::bind(addr).handle(handle).serve(app).await?;
            }
            SecurityMode::Tls {
                cert_path,
                key_path,
            } => {
                // ring is the only provider this binary ships with
                let _ = rustls::crypto::ring::default_provider().install_default();
                let tls = RustlsConfig::from_pem_file(&cert_path, &key_path)
                    .await
                    .map_err(|source| CliError::Tls { cert_path, source })?;
                tokio::spawn(announce(handle.clone(), "https", events, policy));
                axum_server::bind_rustls(addr, tls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Builds the route table for a replay state.
pub fn router(state: ReplayState) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/health", get(routes::health))
        .route("/sse", get(routes::sse_handler))
        .route("/ws", get(routes::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn lookup(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
        CliError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{addr} did not resolve to any address"),
        ))
    })
}

async fn announce(handle: Handle, scheme: &str, events: usize, policy: ViolationPolicy) {
    if let Some(local) = handle.listening().await {
        println!("AG-UI replay server listening on {scheme}://{local}");
        log::info!("replaying {events} event(s) per connection with policy {policy}");
    }
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for Ctrl-C: {e}");
        return;
    }
    log::info!("shutting down replay server");
    handle.graceful_shutdown(Some(Duration::from_secs(5)));
}
