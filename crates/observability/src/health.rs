//! Health-Check-Endpunkt fuer Klangbruecke
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Zielstatus pro Stream.
//! Solange ein Stream kein aufgeloestes Ziel hat, ist der Status `degraded`.

use crate::metrics::BridgeMetriken;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Zielstatus eines einzelnen Streams
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamHealth {
    pub name: String,
    pub ziel_bekannt: bool,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub streams: Vec<StreamHealth>,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Der Zielstatus wird aus dem `klangbruecke_ziel_bekannt`-Gauge gelesen,
/// es gibt also nur eine Quelle der Wahrheit.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    metriken: BridgeMetriken,
}

impl HealthState {
    pub fn neu(metriken: BridgeMetriken) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            metriken,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Zielstatus aller angemeldeten Streams
    pub fn streams(&self) -> Vec<StreamHealth> {
        self.metriken
            .stream_namen()
            .into_iter()
            .map(|name| StreamHealth {
                ziel_bekannt: self.metriken.ziel_bekannt_fuer(&name),
                name,
            })
            .collect()
    }

    /// Erstellt die aktuelle Health-Antwort
    pub fn bericht(&self) -> HealthResponse {
        let streams = self.streams();
        let status = if streams.iter().all(|s| s.ziel_bekannt) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            streams,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Bridge-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    // 200 auch bei degraded: ein fehlendes Ziel ist kein Ausfall
    (StatusCode::OK, Json(state.bericht()))
}
