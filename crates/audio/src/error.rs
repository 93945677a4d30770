//! Fehlertypen fuer Konvertierung und Encoding

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Stufe
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Frame hat falsche Groesse: erwartet {erwartet} Samples, erhalten {erhalten}")]
    FrameGroesse { erwartet: usize, erhalten: usize },

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
