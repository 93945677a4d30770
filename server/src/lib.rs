//! klangbruecke-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::{KlangbrueckeConfig, StreamEinstellungen};
use klangbruecke_audio::OpusEncoder;
use klangbruecke_bridge::{
    BridgePipeline, BridgeServer, BridgeServerConfig, MediaTransport,
};
use klangbruecke_core::KlangbrueckeError;
use klangbruecke_observability::{
    observability_binden, observability_server_starten, BridgeMetriken,
};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Ein gestarteter Stream
pub struct LaufenderStream {
    pub name: String,
    /// Tatsaechliche PCM-Eingangsadresse (relevant bei Port 0)
    pub eingang: SocketAddr,
    pub task: JoinHandle<()>,
}

/// Haelt den laufenden Bridge-Zustand zusammen
pub struct Server {
    pub config: KlangbrueckeConfig,
    metriken: BridgeMetriken,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: KlangbrueckeConfig) -> Result<Self> {
        Ok(Self {
            config,
            metriken: BridgeMetriken::neu()?,
        })
    }

    /// Geteilte Metriken aller Streams
    pub fn metriken(&self) -> &BridgeMetriken {
        &self.metriken
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Konfiguration validieren
    /// 2. Observability-Port binden und Server starten (/metrics, /health)
    /// 3. Pro Stream: Encoder, Sockets, Producer-Anmeldung, Empfangs-Loop
    /// 4. Auf Ctrl-C warten, dann alle Streams beenden
    pub async fn starten(self) -> Result<()> {
        self.config.validieren()?;

        if self.config.observability.aktiviert {
            let addr: SocketAddr = self.config.observability_bind_adresse().parse()?;
            let listener = observability_binden(addr).await?;
            let metriken = self.metriken.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(listener, metriken).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let streams = self.streams_starten(&shutdown_tx).await?;

        tracing::info!(
            streams = streams.len(),
            "Bridge laeuft. Warte auf Shutdown-Signal (Ctrl-C)..."
        );
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Bridge wird beendet");

        let _ = shutdown_tx.send(());
        for stream in streams {
            if let Err(e) = stream.task.await {
                tracing::warn!(stream = %stream.name, fehler = %e, "Stream-Task abgebrochen");
            }
        }

        Ok(())
    }

    /// Startet alle konfigurierten Streams
    ///
    /// Jeder Stream endet, sobald `shutdown` sendet. Schlaegt ein Stream
    /// fehl (Bind, Encoder), werden die bereits gestarteten beendet.
    pub async fn streams_starten(
        &self,
        shutdown: &broadcast::Sender<()>,
    ) -> Result<Vec<LaufenderStream>> {
        let mut laufend = Vec::with_capacity(self.config.streams.len());

        for einstellungen in &self.config.streams {
            match self.stream_starten(einstellungen, shutdown).await {
                Ok(stream) => laufend.push(stream),
                Err(e) => {
                    let _ = shutdown.send(());
                    return Err(e.into());
                }
            }
        }

        Ok(laufend)
    }

    async fn stream_starten(
        &self,
        einstellungen: &StreamEinstellungen,
        shutdown: &broadcast::Sender<()>,
    ) -> klangbruecke_core::Result<LaufenderStream> {
        let encoder = OpusEncoder::new(einstellungen.opus.clone())
            .map_err(|e| KlangbrueckeError::Audio(e.to_string()))?;

        let pipeline = BridgePipeline::neu(
            einstellungen.pipeline_config(),
            Box::new(encoder),
            self.metriken.stream(&einstellungen.name),
        );

        let server_config = BridgeServerConfig {
            bind_addr: einstellungen.eingangs_adresse()?,
            sende_addr: einstellungen.sende_socket_adresse()?,
        };
        let server = BridgeServer::binden(server_config, pipeline).await?;
        let eingang = server.lokale_adresse()?;

        let transport = einstellungen.transport()?;
        let signal = transport
            .producer_registrieren(einstellungen.producer_parameter())
            .await?;

        let mut shutdown_rx = shutdown.subscribe();
        let task = tokio::spawn(server.empfangs_loop_starten(signal, async move {
            let _ = shutdown_rx.recv().await;
        }));

        tracing::info!(
            stream = %einstellungen.name,
            eingang = %eingang,
            ziel_host = %einstellungen.ziel_host,
            ziel_port = ?einstellungen.ziel_port,
            "Stream gestartet"
        );

        Ok(LaufenderStream {
            name: einstellungen.name.clone(),
            eingang,
            task,
        })
    }
}
