//! Klangbruecke – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die Bridge.

use anyhow::Result;
use klangbruecke_observability::logging_initialisieren;
use klangbruecke_server::{
    config::{ConfigQuelle, KlangbrueckeConfig},
    Server,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("KLANGBRUECKE_CONFIG").unwrap_or_else(|_| "klangbruecke.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let (config, quelle) = KlangbrueckeConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format)?;

    if quelle == ConfigQuelle::Standard {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        streams = config.streams.len(),
        "Klangbruecke wird initialisiert"
    );

    let server = Server::neu(config)?;
    server.starten().await?;

    Ok(())
}
