//! klangbruecke-protocol – Wire-Format und Codec-Parameter
//!
//! Dieses Crate definiert das RTP-Paketformat, das die Bridge an den
//! Media-Transport sendet, sowie die Opus-Konfiguration eines Streams.

pub mod codec;
pub mod rtp;

pub use codec::{ChannelCount, FrameSizeMs, OpusApplication, OpusConfig, SampleRate, OPUS_RTP_TAKTRATE};
pub use rtp::{packetize, RtpHeader, RtpSequencer};
