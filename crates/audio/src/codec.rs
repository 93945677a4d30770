//! Frame-Encoder
//!
//! `FrameEncoder` ist die Schnittstelle, ueber die die Bridge-Pipeline
//! genau einen PCM-Frame (bereits als i16) komprimiert. `OpusEncoder`
//! kapselt audiopus und wird aus einer `OpusConfig` aufgebaut.

use audiopus::{coder::Encoder, Application, Channels, SampleRate};
use tracing::debug;

use crate::error::{AudioError, AudioResult};
use klangbruecke_protocol::codec::{
    ChannelCount, OpusApplication, OpusConfig, SampleRate as ProtocolSampleRate,
};

/// Maximale Groesse eines Opus-Pakets; 4000 Bytes reichen fuer alle Frame-Laengen
const MAX_OPUS_PAKET: usize = 4000;

/// Komprimiert einen PCM-Frame fester Groesse
pub trait FrameEncoder: Send {
    /// Kodiert genau einen interleavten i16-Frame
    ///
    /// Die Eingabe muss `frame_size() * channels()` Samples lang sein.
    fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>>;

    /// Samples pro Kanal und Frame
    fn frame_size(&self) -> usize;

    /// Kanalanzahl
    fn channels(&self) -> usize;

    /// Interleavte Samples pro Frame
    fn samples_pro_frame(&self) -> usize {
        self.frame_size() * self.channels()
    }
}

/// Opus-Encoder: kodiert i16-PCM zu Opus-Bytes
pub struct OpusEncoder {
    encoder: Encoder,
    config: OpusConfig,
    frame_size: usize,
}

impl OpusEncoder {
    /// Erstellt einen neuen Encoder mit der gegebenen Konfiguration
    pub fn new(config: OpusConfig) -> AudioResult<Self> {
        config.validieren().map_err(AudioError::Konfiguration)?;

        let sample_rate = protocol_rate_to_audiopus(config.sample_rate);
        let channels = protocol_channels_to_audiopus(config.channels);
        let application = protocol_app_to_audiopus(config.application);

        let mut encoder = Encoder::new(sample_rate, channels, application)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_bitrate(audiopus::Bitrate::BitsPerSecond(
                (config.bitrate_kbps as i32) * 1000,
            ))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_complexity(config.complexity)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_vbr(config.vbr_enabled)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_inband_fec(config.fec_enabled)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        // audiopus 0.2 hat kein set_dtx, daher direkt per CTL (OPUS_SET_DTX_REQUEST = 4016)
        if config.dtx_enabled {
            encoder
                .set_encoder_ctl_request(4016, 1)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        }

        let frame_size = config.samples_pro_kanal();

        debug!(
            bitrate_kbps = config.bitrate_kbps,
            sample_rate = config.sample_rate.als_hz(),
            channels = config.channels.anzahl(),
            frame_size,
            "OpusEncoder erstellt"
        );

        Ok(Self {
            encoder,
            config,
            frame_size,
        })
    }

    /// Gibt die aktuelle Konfiguration zurueck
    pub fn config(&self) -> &OpusConfig {
        &self.config
    }
}

impl FrameEncoder for OpusEncoder {
    fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>> {
        let erwartet = self.samples_pro_frame();
        if pcm.len() != erwartet {
            return Err(AudioError::FrameGroesse {
                erwartet,
                erhalten: pcm.len(),
            });
        }

        let mut output = vec![0u8; MAX_OPUS_PAKET];
        let written = self
            .encoder
            .encode(pcm, &mut output)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        output.truncate(written);
        Ok(output)
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn channels(&self) -> usize {
        self.config.channels.anzahl()
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn protocol_rate_to_audiopus(rate: ProtocolSampleRate) -> SampleRate {
    match rate {
        ProtocolSampleRate::Hz8000 => SampleRate::Hz8000,
        ProtocolSampleRate::Hz12000 => SampleRate::Hz12000,
        ProtocolSampleRate::Hz16000 => SampleRate::Hz16000,
        ProtocolSampleRate::Hz24000 => SampleRate::Hz24000,
        ProtocolSampleRate::Hz48000 => SampleRate::Hz48000,
    }
}

fn protocol_channels_to_audiopus(ch: ChannelCount) -> Channels {
    match ch {
        ChannelCount::Mono => Channels::Mono,
        ChannelCount::Stereo => Channels::Stereo,
    }
}

fn protocol_app_to_audiopus(app: OpusApplication) -> Application {
    match app {
        OpusApplication::Voip => Application::Voip,
        OpusApplication::Audio => Application::Audio,
        OpusApplication::RestrictedLowdelay => Application::LowDelay,
    }
}
