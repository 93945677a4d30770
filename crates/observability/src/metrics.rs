//! Prometheus-kompatible Metriken fuer Klangbruecke
//!
//! Registrierte Metriken (alle mit Label `stream`):
//! - `klangbruecke_datagramme_total` – Counter: Empfangene PCM-Datagramme
//! - `klangbruecke_frames_kodiert_total` – Counter: Erfolgreich kodierte Frames
//! - `klangbruecke_pakete_gesendet_total` – Counter: Gesendete RTP-Pakete
//! - `klangbruecke_pakete_ohne_ziel_total` – Counter: Verworfen, Ziel unbekannt
//! - `klangbruecke_samples_verworfen_total` – Counter: Akkumulator-Overflow
//! - `klangbruecke_encode_fehler_total` – Counter: Encoder-Fehler
//! - `klangbruecke_sendefehler_total` – Counter: UDP-Sendefehler
//! - `klangbruecke_ziel_bekannt` – Gauge: 1 sobald das Ziel aufgeloest ist

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use parking_lot::RwLock;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Klangbruecke-Prometheus-Metriken
#[derive(Clone)]
pub struct BridgeMetriken {
    pub registry: Arc<Registry>,

    pub datagramme_total: IntCounterVec,
    pub frames_kodiert_total: IntCounterVec,
    pub pakete_gesendet_total: IntCounterVec,
    pub pakete_ohne_ziel_total: IntCounterVec,
    pub samples_verworfen_total: IntCounterVec,
    pub encode_fehler_total: IntCounterVec,
    pub sendefehler_total: IntCounterVec,
    pub ziel_bekannt: IntGaugeVec,

    /// Namen aller per `stream()` angemeldeten Streams (fuer /health)
    streams: Arc<RwLock<Vec<String>>>,
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounterVec> {
    let vec = IntCounterVec::new(Opts::new(name, hilfe), &["stream"])?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl BridgeMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let datagramme_total = zaehler(
            &registry,
            "klangbruecke_datagramme_total",
            "Gesamtanzahl empfangener PCM-Datagramme",
        )?;
        let frames_kodiert_total = zaehler(
            &registry,
            "klangbruecke_frames_kodiert_total",
            "Gesamtanzahl erfolgreich kodierter Frames",
        )?;
        let pakete_gesendet_total = zaehler(
            &registry,
            "klangbruecke_pakete_gesendet_total",
            "Gesamtanzahl gesendeter RTP-Pakete",
        )?;
        let pakete_ohne_ziel_total = zaehler(
            &registry,
            "klangbruecke_pakete_ohne_ziel_total",
            "RTP-Pakete, die mangels aufgeloestem Ziel verworfen wurden",
        )?;
        let samples_verworfen_total = zaehler(
            &registry,
            "klangbruecke_samples_verworfen_total",
            "Samples, die wegen vollem Akkumulator verworfen wurden",
        )?;
        let encode_fehler_total = zaehler(
            &registry,
            "klangbruecke_encode_fehler_total",
            "Frames, die der Encoder abgelehnt hat",
        )?;
        let sendefehler_total = zaehler(
            &registry,
            "klangbruecke_sendefehler_total",
            "Fehlgeschlagene UDP-Sendevorgaenge",
        )?;

        let ziel_bekannt = IntGaugeVec::new(
            Opts::new(
                "klangbruecke_ziel_bekannt",
                "1 wenn das RTP-Ziel des Streams aufgeloest ist, sonst 0",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(ziel_bekannt.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            datagramme_total,
            frames_kodiert_total,
            pakete_gesendet_total,
            pakete_ohne_ziel_total,
            samples_verworfen_total,
            encode_fehler_total,
            sendefehler_total,
            ziel_bekannt,
            streams: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Meldet einen Stream an und gibt seine vorbelegten Metrik-Handles zurueck
    ///
    /// Die Label-Aufloesung passiert hier einmalig, nicht pro Paket.
    pub fn stream(&self, name: &str) -> StreamMetriken {
        {
            let mut streams = self.streams.write();
            if !streams.iter().any(|s| s == name) {
                streams.push(name.to_string());
            }
        }

        StreamMetriken {
            name: Arc::from(name),
            datagramme: self.datagramme_total.with_label_values(&[name]),
            frames_kodiert: self.frames_kodiert_total.with_label_values(&[name]),
            pakete_gesendet: self.pakete_gesendet_total.with_label_values(&[name]),
            pakete_ohne_ziel: self.pakete_ohne_ziel_total.with_label_values(&[name]),
            samples_verworfen: self.samples_verworfen_total.with_label_values(&[name]),
            encode_fehler: self.encode_fehler_total.with_label_values(&[name]),
            sendefehler: self.sendefehler_total.with_label_values(&[name]),
            ziel_bekannt: self.ziel_bekannt.with_label_values(&[name]),
        }
    }

    /// Namen aller angemeldeten Streams in Anmeldereihenfolge
    pub fn stream_namen(&self) -> Vec<String> {
        self.streams.read().clone()
    }

    /// Gibt zurueck ob das Ziel eines Streams aufgeloest ist
    pub fn ziel_bekannt_fuer(&self, name: &str) -> bool {
        self.ziel_bekannt.with_label_values(&[name]).get() > 0
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Metrik-Handles eines einzelnen Streams
#[derive(Clone)]
pub struct StreamMetriken {
    name: Arc<str>,
    pub datagramme: IntCounter,
    pub frames_kodiert: IntCounter,
    pub pakete_gesendet: IntCounter,
    pub pakete_ohne_ziel: IntCounter,
    pub samples_verworfen: IntCounter,
    pub encode_fehler: IntCounter,
    pub sendefehler: IntCounter,
    pub ziel_bekannt: IntGauge,
}

impl StreamMetriken {
    /// Name des Streams (Label-Wert)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ziel_bekannt_setzen(&self, bekannt: bool) {
        self.ziel_bekannt.set(i64::from(bekannt));
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: BridgeMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<BridgeMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
