//! UDP Bridge Server – PCM-Empfang und RTP-Versand eines Streams
//!
//! ## Architektur
//!
//! ```text
//! PCM-Socket (recv_from)          ZielSignal (oneshot)     Shutdown
//!     |                                |                      |
//!     +-------------- tokio::select! --+----------------------+
//!     |
//!     v
//! BridgePipeline::datagramm_verarbeiten()
//!     |
//!     v
//! RTP-Socket (send_to) -> Media-Transport
//! ```
//!
//! Ein Datagramm wird inklusive Versand komplett abgearbeitet, bevor das
//! naechste gelesen wird. Damit bleibt die Paketreihenfolge erhalten.

use crate::pipeline::{BridgePipeline, Weiterleitung};
use crate::transport::ZielSignal;
use klangbruecke_core::{KlangbrueckeError, Result};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Maximale UDP-Datagrammgroesse
const UDP_BUFFER_SIZE: usize = 65_536;

// ---------------------------------------------------------------------------
// BridgeServer-Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration fuer den UDP Bridge Server
#[derive(Debug, Clone)]
pub struct BridgeServerConfig {
    /// Eingang fuer PCM-Datagramme (z.B. "0.0.0.0:10000")
    pub bind_addr: SocketAddr,
    /// Lokale Adresse des RTP-Sendesockets
    pub sende_addr: SocketAddr,
}

impl BridgeServerConfig {
    /// Erstellt eine Konfiguration; gesendet wird von einem beliebigen Port
    pub fn neu(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            sende_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeServer
// ---------------------------------------------------------------------------

/// UDP Bridge Server fuer genau einen Stream
pub struct BridgeServer {
    eingang: UdpSocket,
    ausgang: UdpSocket,
    pipeline: BridgePipeline,
}

async fn socket_binden(addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr)
        .await
        .map_err(|quelle| KlangbrueckeError::Bind { addr, quelle })
}

impl BridgeServer {
    /// Bindet Eingangs- und Sendesocket
    pub async fn binden(config: BridgeServerConfig, pipeline: BridgePipeline) -> Result<Self> {
        let eingang = socket_binden(config.bind_addr).await?;
        let ausgang = socket_binden(config.sende_addr).await?;

        tracing::info!(
            stream = pipeline.metriken().name(),
            eingang = %eingang.local_addr()?,
            ausgang = %ausgang.local_addr()?,
            "UDP Bridge Server gebunden"
        );

        Ok(Self {
            eingang,
            ausgang,
            pipeline,
        })
    }

    /// Gibt die lokale PCM-Eingangsadresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.eingang.local_addr()
    }

    /// Gibt die lokale Adresse des RTP-Sendesockets zurueck
    pub fn sende_adresse(&self) -> std::io::Result<SocketAddr> {
        self.ausgang.local_addr()
    }

    /// Startet die Empfangs-Loop (laeuft bis `shutdown` fertig ist)
    ///
    /// `ziel_signal` wird hoechstens einmal ausgewertet. Endet es ohne
    /// Adresse, laeuft der Stream ohne Weiterleitung weiter.
    pub async fn empfangs_loop_starten(
        mut self,
        mut ziel_signal: ZielSignal,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut buf = vec![0u8; UDP_BUFFER_SIZE];
        let mut signal_offen = true;

        let ziel_timeout = tokio::time::sleep(self.pipeline.ziel_timeout());
        let mut timeout_offen = true;
        tokio::pin!(ziel_timeout);
        tokio::pin!(shutdown);

        let stream = self.pipeline.metriken().name().to_string();
        tracing::info!(stream = %stream, "Bridge-Empfangs-Loop gestartet");

        loop {
            tokio::select! {
                // Eingehendes PCM-Datagramm
                result = self.eingang.recv_from(&mut buf) => {
                    match result {
                        Ok((len, absender)) => {
                            tracing::trace!(
                                stream = %stream,
                                bytes = len,
                                absender = %absender,
                                "PCM-Datagramm empfangen"
                            );
                            let weiterleitungen = self.pipeline.datagramm_verarbeiten(&buf[..len]);
                            self.senden(weiterleitungen).await;
                        }
                        Err(e) => {
                            tracing::error!(stream = %stream, fehler = %e, "UDP-Empfangsfehler");
                            // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                    }
                }

                // Zieladresse vom Media-Transport
                ergebnis = &mut ziel_signal, if signal_offen => {
                    signal_offen = false;
                    match ergebnis {
                        Ok(ziel) => {
                            self.pipeline.ziel_setzen(ziel);
                        }
                        Err(_) => {
                            tracing::debug!(stream = %stream, "Ziel-Signal ohne Adresse beendet");
                        }
                    }
                }

                // Einmalige Warnung bei ausbleibendem Ziel
                _ = &mut ziel_timeout, if timeout_offen => {
                    timeout_offen = false;
                    self.pipeline.ziel_timeout_pruefen();
                }

                // Shutdown-Signal
                _ = &mut shutdown => {
                    tracing::info!(stream = %stream, "Bridge: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        tracing::info!(
            stream = %stream,
            sequence = self.pipeline.sequencer().sequence(),
            gepuffert = self.pipeline.akkumulator().buffered(),
            "Bridge-Empfangs-Loop beendet"
        );
    }

    /// Sendet die fertigen RTP-Pakete in Reihenfolge
    async fn senden(&mut self, weiterleitungen: Vec<Weiterleitung>) {
        let metriken = self.pipeline.metriken();
        for w in weiterleitungen {
            match self.ausgang.send_to(&w.paket, w.ziel).await {
                Ok(_) => {
                    metriken.pakete_gesendet.inc();
                    tracing::trace!(
                        stream = metriken.name(),
                        bytes = w.paket.len(),
                        ziel = %w.ziel,
                        "RTP-Paket gesendet"
                    );
                }
                Err(e) => {
                    metriken.sendefehler.inc();
                    tracing::warn!(
                        stream = metriken.name(),
                        fehler = %e,
                        ziel = %w.ziel,
                        "UDP-Sendefehler"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
