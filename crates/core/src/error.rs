//! Fehlertypen fuer Klangbruecke
//!
//! Zentraler Fehler-Enum fuer alle Zustaende, die den Start einer Bridge
//! verhindern. Fehler im laufenden Stream (Encode, Senden, fehlendes Ziel)
//! werden lokal behandelt und tauchen hier nicht auf.

use std::net::SocketAddr;
use thiserror::Error;

/// Globaler Result-Alias fuer Klangbruecke
pub type Result<T> = std::result::Result<T, KlangbrueckeError>;

/// Alle moeglichen Fehler im Klangbruecke-System
#[derive(Debug, Error)]
pub enum KlangbrueckeError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Netzwerk ---
    #[error("Socket konnte nicht gebunden werden ({addr}): {quelle}")]
    Bind {
        addr: SocketAddr,
        #[source]
        quelle: std::io::Error,
    },

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl KlangbrueckeError {
    /// Erstellt einen Konfigurationsfehler aus einer beliebigen Nachricht
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
