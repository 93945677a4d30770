//! klangbruecke-bridge – PCM-ueber-UDP zu RTP
//!
//! Module:
//! - `pipeline`  – Datagramm -> Frames -> Opus -> RTP, ohne I/O
//! - `udp`       – Socket-Loop pro Stream (Empfang, Ziel-Signal, Versand)
//! - `transport` – Anmeldung beim Media-Transport und Ziel-Aufloesung

pub mod pipeline;
pub mod transport;
pub mod udp;

pub use pipeline::{BridgePipeline, PipelineConfig, Weiterleitung, STANDARD_ZIEL_TIMEOUT};
pub use transport::{MediaTransport, ProducerParameter, StatischerTransport, ZielSignal};
pub use udp::{BridgeServer, BridgeServerConfig};
