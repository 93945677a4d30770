//! # klangbruecke-observability
//!
//! Observability-Crate fuer Klangbruecke:
//! - Prometheus-kompatible Metriken pro Stream (`/metrics`)
//! - Health-Check-Endpunkt mit Zielstatus (`/health`)
//! - Structured Logging via tracing-subscriber (Text oder JSON)

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus, StreamHealth};
pub use logging::{logging_initialisieren, LogFormat};
pub use metrics::{metrics_router, BridgeMetriken, StreamMetriken};

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Baut den Router mit `/metrics` und `/health` inklusive Request-Tracing
pub fn observability_router(metriken: BridgeMetriken) -> Router {
    let health = HealthState::neu(metriken.clone());

    Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health))
        .layer(TraceLayer::new_for_http())
}

/// Bindet den TCP-Listener fuer den Observability-Server
pub async fn observability_binden(bind_addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Observability-Server konnte {bind_addr} nicht binden"))
}

/// Betreibt den Observability-HTTP-Server auf einem gebundenen Listener
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
pub async fn observability_server_starten(
    listener: TcpListener,
    metriken: BridgeMetriken,
) -> Result<()> {
    let app = observability_router(metriken);
    tracing::info!(addr = %listener.local_addr()?, "Observability-Server gestartet");

    axum::serve(listener, app).await?;
    Ok(())
}
