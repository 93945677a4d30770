//! Bridge-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass die Bridge ohne Konfigurationsdatei
//! lauffaehig ist (ein Stream auf Port 10000).
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [[streams]]
//! name = "orchester"
//! eingangs_port = 10000
//! ziel_port = 40000
//!
//! [streams.opus]
//! bitrate_kbps = 96
//! ```

use klangbruecke_bridge::{PipelineConfig, ProducerParameter, StatischerTransport};
use klangbruecke_core::{KlangbrueckeError, Result};
use klangbruecke_observability::logging::log_format_gueltig;
use klangbruecke_protocol::{codec::OpusConfig, rtp::MAX_PAYLOAD_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Herkunft einer geladenen Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigQuelle {
    Datei,
    /// Datei fehlte, Standardwerte
    Standard,
}

/// Vollstaendige Bridge-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlangbrueckeConfig {
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
    /// Ein Eintrag pro PCM-Eingang
    pub streams: Vec<StreamEinstellungen>,
}

impl Default for KlangbrueckeConfig {
    fn default() -> Self {
        Self {
            logging: LoggingEinstellungen::default(),
            observability: ObservabilityEinstellungen::default(),
            streams: vec![StreamEinstellungen::default()],
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Filter-Direktive, z.B. "info" oder "klangbruecke_bridge=trace,info"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    pub bind_adresse: String,
    /// Port fuer Metriken und Health (Standard: 9310)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            bind_adresse: "0.0.0.0".into(),
            port: 9310,
        }
    }
}

/// Einstellungen eines einzelnen Streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEinstellungen {
    /// Name fuer Logs und Metrik-Labels
    pub name: String,
    /// Bind-Adresse fuer PCM-Eingang
    pub bind_adresse: String,
    /// UDP-Port fuer PCM-Eingang
    pub eingangs_port: u16,
    /// Lokale Adresse des RTP-Sendesockets
    pub sende_adresse: String,
    /// Host, an den die RTP-Pakete gehen
    pub ziel_host: String,
    /// Port des Media-Transports; ohne Port werden Pakete verworfen
    pub ziel_port: Option<u16>,
    /// Wartezeit bis der Media-Transport sein Ziel meldet
    pub ermittlung_verzoegerung_ms: u64,
    /// Nach dieser Zeit ohne Ziel wird gewarnt
    pub ziel_timeout_ms: u64,
    pub payload_type: u8,
    pub ssrc: u32,
    /// Opus-Encoder-Einstellungen
    pub opus: OpusConfig,
}

impl Default for StreamEinstellungen {
    fn default() -> Self {
        Self {
            name: "haupt".into(),
            bind_adresse: "0.0.0.0".into(),
            eingangs_port: 10000,
            sende_adresse: "0.0.0.0:0".into(),
            ziel_host: "127.0.0.1".into(),
            ziel_port: None,
            ermittlung_verzoegerung_ms: 500,
            ziel_timeout_ms: 10_000,
            payload_type: 100,
            ssrc: 111_111,
            opus: OpusConfig::default(),
        }
    }
}

impl StreamEinstellungen {
    /// Adresse des PCM-Eingangs
    pub fn eingangs_adresse(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind_adresse.parse().map_err(|e| {
            KlangbrueckeError::konfiguration(format!(
                "Stream '{}': ungueltige bind_adresse '{}': {e}",
                self.name, self.bind_adresse
            ))
        })?;
        Ok(SocketAddr::new(ip, self.eingangs_port))
    }

    /// Lokale Adresse des RTP-Sendesockets
    pub fn sende_socket_adresse(&self) -> Result<SocketAddr> {
        self.sende_adresse.parse().map_err(|e| {
            KlangbrueckeError::konfiguration(format!(
                "Stream '{}': ungueltige sende_adresse '{}': {e}",
                self.name, self.sende_adresse
            ))
        })
    }

    /// Host des Media-Transports
    pub fn ziel_ip(&self) -> Result<IpAddr> {
        self.ziel_host.parse().map_err(|e| {
            KlangbrueckeError::konfiguration(format!(
                "Stream '{}': ungueltiger ziel_host '{}': {e}",
                self.name, self.ziel_host
            ))
        })
    }

    /// RTP-Parameter fuer die Pipeline
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            ziel_timeout: Duration::from_millis(self.ziel_timeout_ms),
            ..PipelineConfig::neu(
                self.payload_type,
                self.ssrc,
                self.opus.rtp_ticks_pro_frame(),
            )
        }
    }

    /// Anmeldeparameter fuer den Media-Transport
    pub fn producer_parameter(&self) -> ProducerParameter {
        ProducerParameter::opus(
            self.name.clone(),
            self.opus.channels.anzahl() as u8,
            self.payload_type,
            self.ssrc,
        )
    }

    /// Transport mit dem konfigurierten Ziel
    pub fn transport(&self) -> Result<StatischerTransport> {
        Ok(StatischerTransport::neu(
            self.ziel_ip()?,
            self.ziel_port,
            Duration::from_millis(self.ermittlung_verzoegerung_ms),
        ))
    }
}

impl KlangbrueckeConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Loggt selbst nichts, da das Logging erst mit dieser Konfiguration
    /// initialisiert wird. Die Quelle meldet der Aufrufer.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, ConfigQuelle)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok((config, ConfigQuelle::Datei))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigQuelle::Standard))
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft die Konfiguration auf Widersprueche
    pub fn validieren(&self) -> Result<()> {
        if !log_format_gueltig(&self.logging.format) {
            return Err(KlangbrueckeError::konfiguration(format!(
                "logging.format '{}' ungueltig (text oder json)",
                self.logging.format
            )));
        }

        if self.streams.is_empty() {
            return Err(KlangbrueckeError::konfiguration(
                "mindestens ein [[streams]]-Eintrag erforderlich",
            ));
        }

        let mut namen = HashSet::new();
        let mut ports = HashSet::new();
        let mut ssrcs = HashSet::new();

        for stream in &self.streams {
            if !namen.insert(stream.name.as_str()) {
                return Err(KlangbrueckeError::konfiguration(format!(
                    "Stream-Name '{}' doppelt",
                    stream.name
                )));
            }
            stream.eingangs_adresse()?;
            // Port 0 = vom OS vergeben, kann nicht kollidieren
            if stream.eingangs_port != 0 && !ports.insert(stream.eingangs_port) {
                return Err(KlangbrueckeError::konfiguration(format!(
                    "Stream '{}': eingangs_port {} bereits vergeben",
                    stream.name, stream.eingangs_port
                )));
            }
            if !ssrcs.insert(stream.ssrc) {
                return Err(KlangbrueckeError::konfiguration(format!(
                    "Stream '{}': SSRC {} bereits vergeben",
                    stream.name, stream.ssrc
                )));
            }
            if stream.payload_type > MAX_PAYLOAD_TYPE {
                return Err(KlangbrueckeError::konfiguration(format!(
                    "Stream '{}': payload_type {} > {MAX_PAYLOAD_TYPE}",
                    stream.name, stream.payload_type
                )));
            }
            stream.opus.validieren().map_err(|e| {
                KlangbrueckeError::konfiguration(format!("Stream '{}': {e}", stream.name))
            })?;
            stream.sende_socket_adresse()?;
            stream.ziel_ip()?;
            if stream.ziel_port == Some(0) {
                return Err(KlangbrueckeError::konfiguration(format!(
                    "Stream '{}': ziel_port 0 ist kein gueltiges Ziel",
                    stream.name
                )));
            }
        }

        Ok(())
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!(
            "{}:{}",
            self.observability.bind_adresse, self.observability.port
        )
    }
}
