//! Schnittstelle zum externen Media-Transport
//!
//! Die Bridge meldet pro Stream einen Producer an (Codec-Parameter, SSRC)
//! und erhaelt dafuer ein einmaliges Ziel-Signal. Sobald der Transport
//! seinen Empfangs-Endpunkt kennt, feuert das Signal mit der Adresse, an
//! die die RTP-Pakete gehen sollen.
//!
//! Aushandlung, ICE/DTLS und Routing bleiben Sache des Transports.

use async_trait::async_trait;
use klangbruecke_core::Result;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::sync::oneshot;

/// Einmaliges Signal mit der aufgeloesten RTP-Zieladresse
///
/// Wird der Sender ohne Wert gedroppt, kommt nie ein Ziel; die Bridge
/// laeuft dann ohne Weiterleitung weiter.
pub type ZielSignal = oneshot::Receiver<SocketAddr>;

/// Parameter, mit denen ein Producer beim Transport angemeldet wird
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerParameter {
    /// Stream-Name (nur fuer Logs und Zuordnung)
    pub stream: String,
    /// MIME-Typ des Payloads, z.B. `audio/opus`
    pub mime_type: String,
    /// RTP-Taktrate in Hz
    pub clock_rate: u32,
    pub channels: u8,
    pub payload_type: u8,
    pub ssrc: u32,
}

impl ProducerParameter {
    /// Standard-Parameter fuer einen Opus-Stream
    pub fn opus(stream: impl Into<String>, channels: u8, payload_type: u8, ssrc: u32) -> Self {
        Self {
            stream: stream.into(),
            mime_type: "audio/opus".to_string(),
            clock_rate: klangbruecke_protocol::OPUS_RTP_TAKTRATE,
            channels,
            payload_type,
            ssrc,
        }
    }
}

/// Externer Media-Transport, der RTP-Pakete entgegennimmt
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Meldet einen Producer an und liefert das Signal fuer die Zieladresse
    async fn producer_registrieren(&self, parameter: ProducerParameter) -> Result<ZielSignal>;
}

// ---------------------------------------------------------------------------
// StatischerTransport
// ---------------------------------------------------------------------------

/// Transport mit fest konfiguriertem Ziel
///
/// Loest das Ziel nach `verzoegerung` auf, so wie ein realer Transport
/// seinen Port erst kurz nach dem Anlegen des Producers kennt. Ohne
/// konfigurierten Port feuert das Signal nie.
#[derive(Debug, Clone)]
pub struct StatischerTransport {
    ziel_host: IpAddr,
    ziel_port: Option<u16>,
    verzoegerung: Duration,
}

impl StatischerTransport {
    pub fn neu(ziel_host: IpAddr, ziel_port: Option<u16>, verzoegerung: Duration) -> Self {
        Self {
            ziel_host,
            ziel_port,
            verzoegerung,
        }
    }

    /// Lokaler Transport auf 127.0.0.1 mit 500ms Verzoegerung
    pub fn lokal(ziel_port: Option<u16>) -> Self {
        Self::neu(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            ziel_port,
            Duration::from_millis(500),
        )
    }

    /// Zieladresse, falls ein Port konfiguriert ist
    pub fn ziel(&self) -> Option<SocketAddr> {
        self.ziel_port
            .map(|port| SocketAddr::new(self.ziel_host, port))
    }
}

#[async_trait]
impl MediaTransport for StatischerTransport {
    async fn producer_registrieren(&self, parameter: ProducerParameter) -> Result<ZielSignal> {
        let (tx, rx) = oneshot::channel();

        tracing::info!(
            stream = %parameter.stream,
            mime_type = %parameter.mime_type,
            clock_rate = parameter.clock_rate,
            channels = parameter.channels,
            payload_type = parameter.payload_type,
            ssrc = parameter.ssrc,
            "Producer angemeldet"
        );

        let Some(ziel) = self.ziel() else {
            tracing::warn!(
                stream = %parameter.stream,
                "Kein Ziel-Port konfiguriert, RTP-Pakete werden verworfen"
            );
            return Ok(rx);
        };

        let verzoegerung = self.verzoegerung;
        let stream = parameter.stream;
        tokio::spawn(async move {
            tokio::time::sleep(verzoegerung).await;
            if tx.send(ziel).is_err() {
                tracing::debug!(stream = %stream, "Ziel-Signal ohne Empfaenger");
            } else {
                tracing::debug!(stream = %stream, ziel = %ziel, "Ziel aufgeloest");
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter() -> ProducerParameter {
        ProducerParameter::opus("test", 2, 100, 111_111)
    }

    #[test]
    fn opus_parameter_standard() {
        let p = parameter();
        assert_eq!(p.mime_type, "audio/opus");
        assert_eq!(p.clock_rate, 48_000);
        assert_eq!(p.channels, 2);
    }

    #[test]
    fn lokaler_transport_zieladresse() {
        let t = StatischerTransport::lokal(Some(40000));
        assert_eq!(t.ziel(), Some("127.0.0.1:40000".parse().unwrap()));
        assert_eq!(StatischerTransport::lokal(None).ziel(), None);
    }

    #[tokio::test]
    async fn ziel_wird_nach_verzoegerung_aufgeloest() {
        let t = StatischerTransport::neu(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(40001),
            Duration::from_millis(20),
        );
        let signal = t.producer_registrieren(parameter()).await.unwrap();
        let ziel = tokio::time::timeout(Duration::from_secs(2), signal)
            .await
            .expect("Signal muss innerhalb des Timeouts kommen")
            .expect("Sender darf nicht gedroppt werden");
        assert_eq!(ziel, "127.0.0.1:40001".parse().unwrap());
    }

    #[tokio::test]
    async fn ohne_port_kommt_nie_ein_ziel() {
        let t = StatischerTransport::lokal(None);
        let signal = t.producer_registrieren(parameter()).await.unwrap();
        // Sender ist gedroppt: das Signal endet ohne Adresse
        assert!(signal.await.is_err());
    }
}
