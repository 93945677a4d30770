//! Bridge-Pipeline – PCM-Datagramm rein, RTP-Pakete raus
//!
//! ## Ablauf pro Datagramm
//!
//! ```text
//! bytes_to_float_samples()        <- LE i16 -> f32, Restbyte ignoriert
//!     |
//!     v
//! FrameAccumulator::add_samples() <- 0..n volle Frames
//!     |
//!     v  (pro Frame, in Reihenfolge)
//! floats_to_i16() -> FrameEncoder::encode() -> RtpSequencer::packetize()
//!     |
//!     v
//! Ziel bekannt?  ja -> Weiterleitung   nein -> verwerfen
//! ```
//!
//! Die Pipeline kennt keine Sockets. Sie gibt zurueck, was wohin gesendet
//! werden soll; das Senden uebernimmt der `BridgeServer`.

use bytes::Bytes;
use klangbruecke_audio::{
    bytes_to_float_samples, floats_to_i16, hat_restbyte, FrameAccumulator, FrameEncoder,
};
use klangbruecke_observability::StreamMetriken;
use klangbruecke_protocol::RtpSequencer;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Standard-Wartezeit bis zur Warnung ueber ein fehlendes Ziel
pub const STANDARD_ZIEL_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// RTP-Parameter eines Streams
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub payload_type: u8,
    pub ssrc: u32,
    /// Timestamp-Vorschub pro Frame (Opus: 20ms bei 48kHz = 960)
    pub rtp_ticks_pro_frame: u32,
    /// Nach dieser Zeit ohne Ziel wird einmalig gewarnt
    pub ziel_timeout: Duration,
}

impl PipelineConfig {
    /// Standard-Werte: PT 100, SSRC 111111, 960 Ticks
    pub fn neu(payload_type: u8, ssrc: u32, rtp_ticks_pro_frame: u32) -> Self {
        Self {
            payload_type,
            ssrc,
            rtp_ticks_pro_frame,
            ziel_timeout: STANDARD_ZIEL_TIMEOUT,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::neu(100, 111_111, 960)
    }
}

// ---------------------------------------------------------------------------
// Zielzustand
// ---------------------------------------------------------------------------

/// Zustand der RTP-Zieladresse; wechselt genau einmal nach `Bekannt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZielZustand {
    Unbekannt { seit: Instant, gewarnt: bool },
    Bekannt(SocketAddr),
}

/// Ein fertiges RTP-Paket samt Zieladresse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weiterleitung {
    pub paket: Bytes,
    pub ziel: SocketAddr,
}

// ---------------------------------------------------------------------------
// BridgePipeline
// ---------------------------------------------------------------------------

/// Zustand eines Streams: Akkumulator, Encoder, RTP-Zaehler und Ziel
///
/// Gehoert exklusiv dem Empfangs-Task des Streams.
pub struct BridgePipeline {
    akkumulator: FrameAccumulator,
    encoder: Box<dyn FrameEncoder>,
    sequencer: RtpSequencer,
    ziel: ZielZustand,
    ziel_timeout: Duration,
    metriken: StreamMetriken,
}

impl BridgePipeline {
    /// Erstellt eine Pipeline; Frame-Groesse und Kanaele kommen vom Encoder
    pub fn neu(
        config: PipelineConfig,
        encoder: Box<dyn FrameEncoder>,
        metriken: StreamMetriken,
    ) -> Self {
        let akkumulator = FrameAccumulator::new(encoder.frame_size(), encoder.channels());
        let sequencer = RtpSequencer::neu(
            config.payload_type,
            config.ssrc,
            config.rtp_ticks_pro_frame,
        );
        metriken.ziel_bekannt_setzen(false);

        tracing::debug!(
            stream = metriken.name(),
            payload_type = config.payload_type,
            ssrc = config.ssrc,
            frame_samples = akkumulator.target_samples(),
            "Bridge-Pipeline erstellt"
        );

        Self {
            akkumulator,
            encoder,
            sequencer,
            ziel: ZielZustand::Unbekannt {
                seit: Instant::now(),
                gewarnt: false,
            },
            ziel_timeout: config.ziel_timeout,
            metriken,
        }
    }

    /// Verarbeitet ein PCM-Datagramm vollstaendig
    ///
    /// Gibt die Pakete zurueck, die an das (bekannte) Ziel gesendet werden
    /// sollen. Solange das Ziel unbekannt ist, ist die Liste leer, die
    /// RTP-Zaehler laufen aber weiter.
    pub fn datagramm_verarbeiten(&mut self, daten: &[u8]) -> Vec<Weiterleitung> {
        self.metriken.datagramme.inc();

        if hat_restbyte(daten) {
            tracing::trace!(
                stream = self.metriken.name(),
                bytes = daten.len(),
                "Datagramm mit ungerader Laenge, Restbyte ignoriert"
            );
        }

        let samples = bytes_to_float_samples(daten);
        let verworfen_vorher = self.akkumulator.dropped_samples();
        let frames = self.akkumulator.add_samples(&samples);
        let verworfen = self.akkumulator.dropped_samples() - verworfen_vorher;
        if verworfen > 0 {
            self.metriken.samples_verworfen.inc_by(verworfen);
        }

        let mut weiterleitungen = Vec::with_capacity(frames.len());
        for frame in frames {
            if let Some(w) = self.frame_verarbeiten(&frame) {
                weiterleitungen.push(w);
            }
        }

        self.ziel_timeout_pruefen();
        weiterleitungen
    }

    /// Konvertiert, kodiert und paketiert einen Frame
    fn frame_verarbeiten(&mut self, frame: &[f32]) -> Option<Weiterleitung> {
        let pcm = floats_to_i16(frame);

        let payload = match self.encoder.encode(&pcm) {
            Ok(p) => p,
            Err(e) => {
                // Zaehler bleiben stehen: der naechste Frame bekommt dieselbe Sequenz
                tracing::warn!(
                    stream = self.metriken.name(),
                    fehler = %e,
                    sequence = self.sequencer.sequence(),
                    "Frame konnte nicht kodiert werden, verworfen"
                );
                self.metriken.encode_fehler.inc();
                return None;
            }
        };
        self.metriken.frames_kodiert.inc();

        let sequence = self.sequencer.sequence();
        let paket = self.sequencer.packetize(&payload);

        match self.ziel {
            ZielZustand::Bekannt(ziel) => Some(Weiterleitung { paket, ziel }),
            ZielZustand::Unbekannt { .. } => {
                tracing::debug!(
                    stream = self.metriken.name(),
                    sequence,
                    "Ziel noch unbekannt, RTP-Paket verworfen"
                );
                self.metriken.pakete_ohne_ziel.inc();
                None
            }
        }
    }

    /// Setzt die Zieladresse; nur der erste Aufruf wirkt
    pub fn ziel_setzen(&mut self, ziel: SocketAddr) -> bool {
        match self.ziel {
            ZielZustand::Unbekannt { seit, .. } => {
                tracing::info!(
                    stream = self.metriken.name(),
                    ziel = %ziel,
                    wartezeit_ms = seit.elapsed().as_millis() as u64,
                    "RTP-Ziel aufgeloest"
                );
                self.ziel = ZielZustand::Bekannt(ziel);
                self.metriken.ziel_bekannt_setzen(true);
                true
            }
            ZielZustand::Bekannt(bisher) => {
                tracing::warn!(
                    stream = self.metriken.name(),
                    bisher = %bisher,
                    ignoriert = %ziel,
                    "RTP-Ziel bereits gesetzt, neues Ziel ignoriert"
                );
                false
            }
        }
    }

    /// Warnt einmalig, wenn das Ziel nach `ziel_timeout` noch fehlt
    ///
    /// Gibt true zurueck, wenn bei diesem Aufruf gewarnt wurde.
    pub fn ziel_timeout_pruefen(&mut self) -> bool {
        if let ZielZustand::Unbekannt { seit, gewarnt } = &mut self.ziel {
            if !*gewarnt && seit.elapsed() >= self.ziel_timeout {
                *gewarnt = true;
                tracing::warn!(
                    stream = self.metriken.name(),
                    timeout_ms = self.ziel_timeout.as_millis() as u64,
                    "RTP-Ziel nach Timeout noch unbekannt, Pakete werden weiter verworfen"
                );
                return true;
            }
        }
        false
    }

    /// Aufgeloeste Zieladresse, falls bekannt
    pub fn ziel(&self) -> Option<SocketAddr> {
        match self.ziel {
            ZielZustand::Bekannt(ziel) => Some(ziel),
            ZielZustand::Unbekannt { .. } => None,
        }
    }

    /// Konfigurierte Wartezeit bis zur Ziel-Warnung
    pub fn ziel_timeout(&self) -> Duration {
        self.ziel_timeout
    }

    pub fn sequencer(&self) -> &RtpSequencer {
        &self.sequencer
    }

    pub fn akkumulator(&self) -> &FrameAccumulator {
        &self.akkumulator
    }

    pub fn metriken(&self) -> &StreamMetriken {
        &self.metriken
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use klangbruecke_audio::{AudioError, AudioResult};
    use klangbruecke_observability::BridgeMetriken;
    use klangbruecke_protocol::RtpHeader;
    use std::sync::{Arc, Mutex};

    /// Encoder-Attrappe: liefert die Aufrufnummer als Payload
    struct TestEncoder {
        frame_size: usize,
        channels: usize,
        aufrufe: usize,
        fehler_bei: Vec<usize>,
        eingaben: Arc<Mutex<Vec<Vec<i16>>>>,
    }

    impl TestEncoder {
        fn neu(frame_size: usize, channels: usize) -> Self {
            Self {
                frame_size,
                channels,
                aufrufe: 0,
                fehler_bei: Vec::new(),
                eingaben: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FrameEncoder for TestEncoder {
        fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>> {
            let nr = self.aufrufe;
            self.aufrufe += 1;
            self.eingaben.lock().unwrap().push(pcm.to_vec());
            if self.fehler_bei.contains(&nr) {
                return Err(AudioError::CodecFehler("absichtlich".into()));
            }
            Ok(vec![0xAA, nr as u8])
        }

        fn frame_size(&self) -> usize {
            self.frame_size
        }

        fn channels(&self) -> usize {
            self.channels
        }
    }

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn ziel() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn pipeline_mit(encoder: TestEncoder) -> (BridgePipeline, BridgeMetriken) {
        let metriken = BridgeMetriken::neu().unwrap();
        let config = PipelineConfig::neu(100, 111_111, 4);
        let pipeline = BridgePipeline::neu(config, Box::new(encoder), metriken.stream("test"));
        (pipeline, metriken)
    }

    #[test]
    fn frame_wird_paketiert_und_weitergeleitet() {
        let (mut p, metriken) = pipeline_mit(TestEncoder::neu(4, 2));
        assert!(p.ziel_setzen(ziel()));

        let raus = p.datagramm_verarbeiten(&pcm_bytes(&[1; 8]));
        assert_eq!(raus.len(), 1);
        assert_eq!(raus[0].ziel, ziel());

        let header = RtpHeader::decode(&raus[0].paket).unwrap();
        assert_eq!(header.sequence, 0);
        assert_eq!(header.timestamp, 0);
        assert_eq!(header.ssrc, 111_111);
        assert_eq!(header.payload_type, 100);
        assert!(header.marker);
        assert_eq!(&raus[0].paket[RtpHeader::SIZE..], &[0xAA, 0]);

        let s = metriken.stream("test");
        assert_eq!(s.datagramme.get(), 1);
        assert_eq!(s.frames_kodiert.get(), 1);
    }

    #[test]
    fn teildatagramme_werden_gesammelt() {
        let (mut p, _) = pipeline_mit(TestEncoder::neu(4, 2));
        p.ziel_setzen(ziel());

        assert!(p.datagramm_verarbeiten(&pcm_bytes(&[0; 5])).is_empty());
        let raus = p.datagramm_verarbeiten(&pcm_bytes(&[0; 12]));
        assert_eq!(raus.len(), 2);
        assert_eq!(p.akkumulator().buffered(), 1);

        let seqs: Vec<u16> = raus
            .iter()
            .map(|w| RtpHeader::decode(&w.paket).unwrap().sequence)
            .collect();
        assert_eq!(seqs, vec![0, 1]);
        let ts = RtpHeader::decode(&raus[1].paket).unwrap().timestamp;
        assert_eq!(ts, 4);
    }

    #[test]
    fn encoder_erhaelt_konvertierte_samples() {
        let encoder = TestEncoder::neu(2, 1);
        let eingaben = Arc::clone(&encoder.eingaben);
        let (mut p, _) = pipeline_mit(encoder);

        // Positive Werte verlieren beim Weg ueber f32 genau eins
        p.datagramm_verarbeiten(&pcm_bytes(&[-32768, 32767]));
        assert_eq!(eingaben.lock().unwrap()[0], vec![-32768, 32766]);
    }

    #[test]
    fn ohne_ziel_verworfen_zaehler_laufen_weiter() {
        let (mut p, metriken) = pipeline_mit(TestEncoder::neu(4, 2));

        let raus = p.datagramm_verarbeiten(&pcm_bytes(&[0; 24]));
        assert!(raus.is_empty());
        assert_eq!(p.sequencer().sequence(), 3);
        assert_eq!(p.sequencer().timestamp(), 12);
        assert_eq!(metriken.stream("test").pakete_ohne_ziel.get(), 3);

        // Nach der Aufloesung geht es mit der naechsten Sequenz weiter
        p.ziel_setzen(ziel());
        let raus = p.datagramm_verarbeiten(&pcm_bytes(&[0; 8]));
        assert_eq!(raus.len(), 1);
        let header = RtpHeader::decode(&raus[0].paket).unwrap();
        assert_eq!(header.sequence, 3);
        assert_eq!(header.timestamp, 12);
    }

    #[test]
    fn encode_fehler_ueberspringt_frame_ohne_zaehler() {
        let mut encoder = TestEncoder::neu(4, 2);
        encoder.fehler_bei = vec![1];
        let (mut p, metriken) = pipeline_mit(encoder);
        p.ziel_setzen(ziel());

        let raus = p.datagramm_verarbeiten(&pcm_bytes(&[0; 24]));
        assert_eq!(raus.len(), 2);

        let headers: Vec<RtpHeader> = raus
            .iter()
            .map(|w| RtpHeader::decode(&w.paket).unwrap())
            .collect();
        assert_eq!(headers[0].sequence, 0);
        assert_eq!(headers[1].sequence, 1);
        assert_eq!(headers[1].timestamp, 4);
        // Payload stammt vom dritten Aufruf
        assert_eq!(&raus[1].paket[RtpHeader::SIZE..], &[0xAA, 2]);

        let s = metriken.stream("test");
        assert_eq!(s.encode_fehler.get(), 1);
        assert_eq!(s.frames_kodiert.get(), 2);
    }

    #[test]
    fn ziel_nur_einmal_setzbar() {
        let (mut p, metriken) = pipeline_mit(TestEncoder::neu(4, 2));
        assert_eq!(p.ziel(), None);
        assert!(!metriken.ziel_bekannt_fuer("test"));

        assert!(p.ziel_setzen(ziel()));
        assert!(!p.ziel_setzen("127.0.0.1:50000".parse().unwrap()));
        assert_eq!(p.ziel(), Some(ziel()));
        assert!(metriken.ziel_bekannt_fuer("test"));
    }

    #[test]
    fn overflow_wird_gezaehlt() {
        let (mut p, metriken) = pipeline_mit(TestEncoder::neu(2, 1));
        // Kapazitaet 4, 3 aufgenommen -> 1 Frame, 1 Rest
        p.datagramm_verarbeiten(&pcm_bytes(&[0; 3]));
        // Frei 3, angeboten 10 -> 7 verworfen
        p.datagramm_verarbeiten(&pcm_bytes(&[0; 10]));
        assert_eq!(metriken.stream("test").samples_verworfen.get(), 7);
    }

    #[test]
    fn ungerades_datagramm_ignoriert_restbyte() {
        let (mut p, _) = pipeline_mit(TestEncoder::neu(4, 1));
        p.ziel_setzen(ziel());
        let mut daten = pcm_bytes(&[0; 4]);
        daten.push(0x7F);
        assert_eq!(p.datagramm_verarbeiten(&daten).len(), 1);
        assert_eq!(p.akkumulator().buffered(), 0);
    }

    #[test]
    fn ziel_timeout_warnt_genau_einmal() {
        let metriken = BridgeMetriken::neu().unwrap();
        let config = PipelineConfig {
            ziel_timeout: Duration::ZERO,
            ..PipelineConfig::default()
        };
        let mut p = BridgePipeline::neu(
            config,
            Box::new(TestEncoder::neu(4, 2)),
            metriken.stream("test"),
        );
        assert!(p.ziel_timeout_pruefen());
        assert!(!p.ziel_timeout_pruefen());
    }

    #[test]
    fn kein_timeout_nach_aufloesung() {
        let metriken = BridgeMetriken::neu().unwrap();
        let config = PipelineConfig {
            ziel_timeout: Duration::ZERO,
            ..PipelineConfig::default()
        };
        let mut p = BridgePipeline::neu(
            config,
            Box::new(TestEncoder::neu(4, 2)),
            metriken.stream("test"),
        );
        p.ziel_setzen(ziel());
        assert!(!p.ziel_timeout_pruefen());
    }

    #[test]
    fn leeres_datagramm_aendert_nichts() {
        let (mut p, metriken) = pipeline_mit(TestEncoder::neu(4, 2));
        assert!(p.datagramm_verarbeiten(&[]).is_empty());
        assert_eq!(p.sequencer().sequence(), 0);
        assert_eq!(metriken.stream("test").datagramme.get(), 1);
    }
}
