//! klangbruecke-core – Gemeinsame Fehlertypen
//!
//! Dieses Crate stellt den zentralen Fehler-Enum bereit, den alle
//! anderen Klangbruecke-Crates an ihren Schnittstellen verwenden.

pub mod error;

// Re-Exporte fuer bequemen Zugriff
pub use error::{KlangbrueckeError, Result};
