//! Codec-Konfiguration fuer den Bridge-Stream
//!
//! Definiert die Opus-Konfigurationstypen, mit denen der Encoder jeder
//! Bridge aufgebaut wird. Die Werte muessen zu dem passen, was dem
//! nachgelagerten Media-Transport beim Registrieren des Producers mitgeteilt
//! wurde; ausgehandelt wird hier nichts.

use serde::{Deserialize, Serialize};

/// RTP-Taktrate fuer Opus (RFC 7587: immer 48 kHz, unabhaengig von der Eingangsrate)
pub const OPUS_RTP_TAKTRATE: u32 = 48_000;

// ---------------------------------------------------------------------------
// Opus-Konfiguration
// ---------------------------------------------------------------------------

/// Abtastrate fuer Opus
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// 8 kHz – Schmalband
    Hz8000 = 8000,
    /// 12 kHz – Mittelband
    Hz12000 = 12000,
    /// 16 kHz – Breitband
    Hz16000 = 16000,
    /// 24 kHz – Superbreitband
    Hz24000 = 24000,
    /// 48 kHz – Vollband (Standard fuer die Bridge)
    #[default]
    Hz48000 = 48000,
}

impl SampleRate {
    /// Gibt die Abtastrate in Hz zurueck
    pub fn als_hz(&self) -> u32 {
        *self as u32
    }
}

/// Anzahl der Audio-Kanaele
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCount {
    /// Mono (1 Kanal)
    Mono = 1,
    /// Stereo (2 Kanaele) – Standard fuer Instrumenten-Streams
    #[default]
    Stereo = 2,
}

impl ChannelCount {
    /// Gibt die Kanalanzahl als Zahl zurueck
    pub fn anzahl(&self) -> usize {
        *self as usize
    }
}

/// Opus-Anwendungsmodus
///
/// Beeinflusst intern den Opus-Encoder-Algorithmus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpusApplication {
    /// Optimiert fuer Sprachverstaendlichkeit (VOIP)
    Voip,
    /// Optimiert fuer allgemeine Audio-Qualitaet (Musik)
    #[default]
    Audio,
    /// Minimale Verarbeitungsverzoegerung (Restricted Lowdelay)
    RestrictedLowdelay,
}

/// Frame-Groesse in Millisekunden
///
/// Beeinflusst Latenz vs. Kompressionseffizienz.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSizeMs {
    /// 2.5 ms – minimale Latenz (als Zehntelmillisekunden: 25)
    Ms2_5 = 25,
    /// 5 ms
    Ms5 = 50,
    /// 10 ms
    Ms10 = 100,
    /// 20 ms – Standard
    #[default]
    Ms20 = 200,
    /// 40 ms
    Ms40 = 400,
    /// 60 ms – maximale Kompression
    Ms60 = 600,
}

impl FrameSizeMs {
    /// Berechnet die Anzahl der Samples pro Kanal und Frame bei gegebener Abtastrate
    pub fn samples_per_frame(&self, sample_rate: SampleRate) -> u32 {
        let rate = sample_rate as u32;
        let ms_x10 = *self as u32;
        // ms_x10 / 10 * rate / 1000 = ms_x10 * rate / 10000
        ms_x10 * rate / 10000
    }
}

/// Vollstaendige Opus-Codec-Konfiguration eines Bridge-Streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpusConfig {
    /// Ziel-Bitrate in kbps (6–510)
    pub bitrate_kbps: u16,
    /// Abtastrate des eingehenden PCM
    pub sample_rate: SampleRate,
    /// Anzahl der Kanaele
    pub channels: ChannelCount,
    /// Frame-Groesse
    pub frame_size: FrameSizeMs,
    /// Anwendungsmodus
    pub application: OpusApplication,
    /// Forward Error Correction aktivieren
    pub fec_enabled: bool,
    /// Discontinuous Transmission aktivieren
    pub dtx_enabled: bool,
    /// Komplexitaet (0–10, hoeher = bessere Qualitaet, mehr CPU)
    pub complexity: u8,
    /// Variable Bitrate aktivieren
    pub vbr_enabled: bool,
}

impl Default for OpusConfig {
    /// 48 kHz Stereo, 20 ms Frames (960 Samples pro Kanal)
    fn default() -> Self {
        Self {
            bitrate_kbps: 128,
            sample_rate: SampleRate::Hz48000,
            channels: ChannelCount::Stereo,
            frame_size: FrameSizeMs::Ms20,
            application: OpusApplication::Audio,
            fec_enabled: false,
            dtx_enabled: false,
            complexity: 10,
            vbr_enabled: true,
        }
    }
}

impl OpusConfig {
    /// Validiert die Konfiguration
    pub fn validieren(&self) -> Result<(), String> {
        if self.bitrate_kbps < 6 || self.bitrate_kbps > 510 {
            return Err(format!(
                "Bitrate muss zwischen 6 und 510 kbps liegen (war: {})",
                self.bitrate_kbps
            ));
        }
        if self.complexity > 10 {
            return Err(format!(
                "Komplexitaet muss zwischen 0 und 10 liegen (war: {})",
                self.complexity
            ));
        }
        Ok(())
    }

    /// Samples pro Kanal und Frame (bei 48 kHz / 20 ms: 960)
    pub fn samples_pro_kanal(&self) -> usize {
        self.frame_size.samples_per_frame(self.sample_rate) as usize
    }

    /// Interleavte Samples pro Frame ueber alle Kanaele
    pub fn samples_pro_frame(&self) -> usize {
        self.samples_pro_kanal() * self.channels.anzahl()
    }

    /// RTP-Zeitstempel-Inkrement pro Frame in Ticks der Opus-RTP-Taktrate
    pub fn rtp_ticks_pro_frame(&self) -> u32 {
        self.frame_size.samples_per_frame(SampleRate::Hz48000)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
