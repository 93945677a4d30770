//! RTP-Paketierung (RFC 3550)
//!
//! Baut aus einer Opus-Nutzlast ein RTP-Paket fuer den nachgelagerten
//! Media-Transport. Der Header ist fest: keine CSRCs, keine Extension,
//! kein Padding, Marker-Bit immer gesetzt.
//!
//! ## Paketformat (Header = 12 Bytes)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   0x80 (Version 2, P=0, X=0, CC=0)
//!  1       1   0x80 | PayloadType (Marker-Bit gesetzt)
//!  2       2   SequenzNummer (big-endian, mod 65536)
//!  4       4   Zeitstempel (big-endian, 48 kHz-Ticks)
//!  8       4   SSRC (big-endian)
//! 12+      N   Nutzdaten (Opus-Bytes, unveraendert)
//! ```
//!
//! Jeder Frame wird als eigener Talkspurt-Beginn markiert. Der Empfaenger
//! erwartet genau dieses Bitmuster, daher bleibt das Marker-Bit fest.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;

/// RTP-Version im Header
pub const RTP_VERSION: u8 = 2;

/// Byte 0 des Headers: Version 2, kein Padding, keine Extension, keine CSRCs
const BYTE0: u8 = RTP_VERSION << 6;

/// Marker-Bit in Byte 1
const MARKER: u8 = 0x80;

/// Hoechster gueltiger Payload-Type (7 Bit)
pub const MAX_PAYLOAD_TYPE: u8 = 0x7F;

// ---------------------------------------------------------------------------
// RtpHeader
// ---------------------------------------------------------------------------

/// 12-Byte RTP-Header
///
/// Direkte Byte-Serialisierung, kein serde (Hot Path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Marker-Bit
    pub marker: bool,
    /// Payload-Type (7 Bit)
    pub payload_type: u8,
    /// Sequenznummer
    pub sequence: u16,
    /// Zeitstempel in Ticks der RTP-Taktrate
    pub timestamp: u32,
    /// Synchronisation Source
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header-Groesse in Bytes
    pub const SIZE: usize = 12;

    /// Erstellt einen Header mit gesetztem Marker-Bit
    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            marker: true,
            payload_type: payload_type & MAX_PAYLOAD_TYPE,
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Serialisiert den Header in ein 12-Byte-Array (big-endian)
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = BYTE0;
        let marker = if self.marker { MARKER } else { 0 };
        buf[1] = marker | (self.payload_type & MAX_PAYLOAD_TYPE);
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        buf
    }

    /// Deserialisiert einen Header aus einem Byte-Slice
    ///
    /// # Fehler
    /// - `InvalidData` wenn das Slice kuerzer als 12 Bytes ist
    /// - `InvalidData` bei einer anderen RTP-Version als 2
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "RTP-Header zu kurz: {} Bytes (erwartet {})",
                    buf.len(),
                    Self::SIZE
                ),
            ));
        }

        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Ungueltige RTP-Version: {} (erwartet {})",
                    version, RTP_VERSION
                ),
            ));
        }

        Ok(Self {
            marker: buf[1] & MARKER != 0,
            payload_type: buf[1] & MAX_PAYLOAD_TYPE,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// Baut ein vollstaendiges RTP-Paket (Header + Nutzdaten)
///
/// Die Sequenznummer wird bereits als `u16` uebergeben, ist also implizit
/// modulo 65536. Laenge des Ergebnisses: `12 + payload.len()`.
pub fn packetize(payload: &[u8], sequence: u16, timestamp: u32, ssrc: u32, payload_type: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(RtpHeader::SIZE + payload.len());
    buf.put_u8(BYTE0);
    buf.put_u8(MARKER | (payload_type & MAX_PAYLOAD_TYPE));
    buf.put_u16(sequence);
    buf.put_u32(timestamp);
    buf.put_u32(ssrc);
    buf.put_slice(payload);
    buf.freeze()
}

// ---------------------------------------------------------------------------
// RtpSequencer
// ---------------------------------------------------------------------------

/// Sequenz- und Zeitstempel-Zustand eines RTP-Streams
///
/// Eine Instanz pro Stream. Beide Zaehler starten bei 0 und werden nur
/// beim Paketieren weitergezaehlt, nie zurueckgesetzt.
#[derive(Debug, Clone)]
pub struct RtpSequencer {
    payload_type: u8,
    ssrc: u32,
    ticks_pro_frame: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpSequencer {
    /// Erstellt einen neuen Sequencer
    ///
    /// `ticks_pro_frame` ist das Zeitstempel-Inkrement pro Frame
    /// (bei 48 kHz / 20 ms: 960).
    pub fn neu(payload_type: u8, ssrc: u32, ticks_pro_frame: u32) -> Self {
        Self {
            payload_type: payload_type & MAX_PAYLOAD_TYPE,
            ssrc,
            ticks_pro_frame,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Paketiert eine Nutzlast mit den aktuellen Zaehlern und zaehlt danach weiter
    pub fn packetize(&mut self, payload: &[u8]) -> Bytes {
        let paket = packetize(payload, self.sequence, self.timestamp, self.ssrc, self.payload_type);
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.ticks_pro_frame);
        paket
    }

    /// Sequenznummer des naechsten Pakets
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Zeitstempel des naechsten Pakets
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// SSRC des Streams
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Payload-Type des Streams
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
