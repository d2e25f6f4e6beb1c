//! Room Controller
//!
//! Stateful WebSocket signaling server for real-time call coordination.
//!
//! # Servers
//!
//! The Room Controller runs a single HTTP server (default: 0.0.0.0:8080)
//! carrying:
//! - `GET /ws` - WebSocket endpoint for client signaling
//! - `GET /health`, `GET /ready` - Kubernetes probes
//! - `GET /metrics` - Prometheus text exposition
//!
//! # Architecture
//!
//! Uses an actor model hierarchy:
//! - `RoomRegistryActor` (singleton): Supervises rooms, owns the membership
//!   and transport indexes
//! - `RoomActor` (per room): Owns the roster and the screen-share arbiter,
//!   relays validated signals
//! - `SessionRecorder`: Persists session audit records off the signaling path
//!
//! # Startup Flow
//!
//! 1. Initialize tracing (JSON or human-readable per `RC_LOG_JSON`)
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Spawn the session recorder
//! 5. Spawn the room registry actor
//! 6. Bind and serve the HTTP surface
//! 7. Wait for shutdown signal, then drain: reject new joins, cancel rooms,
//!    flush the recorder

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use room_controller::actors::{RegistryMetrics, RoomRegistryActor};
use room_controller::config::Config;
use room_controller::observability::{health_router, init_metrics_recorder, HealthState};
use room_controller::recorder::{SessionRecorder, TracingSessionStore};
use room_controller::ws::ws_router;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing. The format flag is read straight from the
    // environment because configuration errors must be loggable.
    let log_json = std::env::var("RC_LOG_JSON")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(false);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "room_controller=debug,tower_http=debug".into());
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Room Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        rc_id = %config.rc_id,
        health_bind_address = %config.health_bind_address,
        shutdown_timeout_secs = config.shutdown_timeout_secs,
        room_mailbox_capacity = config.room_mailbox_capacity,
        log_json = config.log_json,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    // This must happen before any metrics are recorded
    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    // Initialize health state
    let health_state = Arc::new(HealthState::new());

    // The recorder gets its own token: it must outlive the registry so the
    // session-end records queued during drain still reach the store.
    let recorder_token = CancellationToken::new();
    let (recorder_handle, recorder_task) =
        SessionRecorder::spawn(TracingSessionStore, recorder_token.clone());
    info!("Session recorder started");

    // Initialize actor system
    info!("Initializing actor system...");
    let registry_token = CancellationToken::new();
    let (registry_handle, registry_task) = RoomRegistryActor::spawn(
        config.rc_id.clone(),
        recorder_handle,
        config.room_mailbox_capacity,
        registry_token,
        RegistryMetrics::new(),
    );
    info!("Actor system initialized");

    // Child of the registry token: cancelling the registry takes the HTTP
    // server down with it
    let shutdown_token = registry_handle.child_token();

    // Build the HTTP surface (MUST bind - fail startup if it doesn't)
    let bind_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    // Add /metrics endpoint served by the Prometheus exporter
    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = health_router(Arc::clone(&health_state))
        .merge(metrics_router)
        .merge(ws_router(registry_handle.clone()))
        .layer(TraceLayer::new_for_http());

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(bind_addr).await.map_err(|e| {
        error!(error = %e, addr = %bind_addr, "Failed to bind server");
        format!("Failed to bind server to {bind_addr}: {e}")
    })?;
    info!(addr = %bind_addr, "Server bound successfully");

    // Spawn the server task
    let server_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %bind_addr, "Server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_shutdown_token.cancelled().await;
            info!("Server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Server failed");
        }
    });

    // Registry is up and the listener is bound: accept traffic
    health_state.set_ready();

    // Wait for shutdown signal
    info!("Room Controller running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so k8s stops sending traffic
    health_state.set_not_ready();

    // Reject new joins while existing sessions are still being served
    if let Err(e) = registry_handle.begin_drain().await {
        warn!(error = %e, "Failed to begin drain");
    }

    // Give in-flight frames time to land
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Cancel the registry; rooms and the HTTP server follow via child tokens
    registry_handle.cancel();

    match tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        registry_task,
    )
    .await
    {
        Ok(Ok(())) => info!("Registry actor shut down cleanly"),
        Ok(Err(e)) => warn!(error = %e, "Registry actor task failed during shutdown"),
        Err(_) => warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Registry actor shutdown timed out"
        ),
    }

    // The registry has exited; everything it queued is in the recorder's
    // mailbox, so the flush-on-cancel pass sees a complete audit trail.
    recorder_token.cancel();
    if let Err(e) = recorder_task.await {
        warn!(error = %e, "Session recorder task failed during shutdown");
    }

    info!("Room Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
