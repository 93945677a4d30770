//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfigdatei):
//! - `KB_LOG_LEVEL`: Filter-Direktive (trace/debug/info/warn/error oder
//!   `klangbruecke_bridge=debug,info`), Standard: info
//! - `KB_LOG_FORMAT`: Format (text/json), Standard: text

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "KB_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "KB_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Unbekannte Werte fallen auf `Text` zurueck
    pub fn aus_str(format: &str) -> Self {
        match format {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Verrechnet Konfigwerte mit den Umgebungsvariablen
///
/// `env` liefert den Wert einer Variable; so bleibt die Logik ohne
/// Prozess-Umgebung testbar.
pub fn einstellungen_aufloesen(
    level: &str,
    format: &str,
    env: impl Fn(&str) -> Option<String>,
) -> (String, LogFormat) {
    let level = env(ENV_LOG_LEVEL)
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| level.to_string());
    let format = env(ENV_LOG_FORMAT).unwrap_or_else(|| format.to_string());
    (level, LogFormat::aus_str(&format))
}

/// Initialisiert das Logging-System.
///
/// Liest `KB_LOG_LEVEL` und `KB_LOG_FORMAT` aus der Umgebung.
/// Ungueltige Filter-Direktiven fallen auf `info` zurueck. Schlaegt fehl,
/// wenn bereits ein globaler Subscriber gesetzt ist.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let (level, format) = einstellungen_aufloesen(level, format, |k| std::env::var(k).ok());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    ergebnis.map_err(|e| anyhow!("Logging-Initialisierung fehlgeschlagen: {e}"))
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
