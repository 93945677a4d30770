//! klangbruecke-audio – Audio-Stufe der Bridge
//!
//! - PCM-Bytes -> f32 -> i16 Konvertierung
//! - Frame-Akkumulator (Datagramm-Stuecke -> Frames fester Groesse)
//! - Opus Encoding hinter dem `FrameEncoder`-Trait

pub mod accumulator;
pub mod codec;
pub mod convert;
pub mod error;

// Bequeme Re-Exporte der wichtigsten Typen
pub use accumulator::FrameAccumulator;
pub use codec::{FrameEncoder, OpusEncoder};
pub use convert::{bytes_to_float_samples, float_to_i16, floats_to_i16, hat_restbyte};
pub use error::{AudioError, AudioResult};
