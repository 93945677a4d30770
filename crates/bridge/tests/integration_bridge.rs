//! Integration-Tests fuer die Bridge (echte UDP-Sockets auf 127.0.0.1)

use klangbruecke_audio::OpusEncoder;
use klangbruecke_bridge::{
    BridgePipeline, BridgeServer, BridgeServerConfig, MediaTransport, PipelineConfig,
    ProducerParameter, StatischerTransport,
};
use klangbruecke_observability::{BridgeMetriken, StreamMetriken};
use klangbruecke_protocol::{OpusConfig, RtpHeader};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

fn localhost(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// 20ms Stereo-Sinus als LE-PCM (1920 Samples = 3840 Bytes)
fn sinus_frame(phase: usize) -> Vec<u8> {
    (0..1920)
        .map(|i| {
            let t = (phase * 960 + i / 2) as f32 / 48_000.0;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16
        })
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

async fn warten_bis(bedingung: impl Fn() -> bool) {
    for _ in 0..200 {
        if bedingung() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Bedingung nicht innerhalb von 1s erfuellt");
}

struct Aufbau {
    server_addr: SocketAddr,
    metriken: StreamMetriken,
    shutdown_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

async fn bridge_starten(transport: StatischerTransport, name: &str) -> Aufbau {
    let config = OpusConfig::default();
    let metriken = BridgeMetriken::neu().unwrap().stream(name);

    let signal = transport
        .producer_registrieren(ProducerParameter::opus(name, 2, 100, 111_111))
        .await
        .unwrap();

    let pipeline = BridgePipeline::neu(
        PipelineConfig::neu(100, 111_111, config.rtp_ticks_pro_frame()),
        Box::new(OpusEncoder::new(config).unwrap()),
        metriken.clone(),
    );
    let server = BridgeServer::binden(
        BridgeServerConfig {
            bind_addr: localhost(0),
            sende_addr: localhost(0),
        },
        pipeline,
    )
    .await
    .unwrap();
    let server_addr = server.lokale_adresse().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.empfangs_loop_starten(signal, async {
        let _ = shutdown_rx.await;
    }));

    Aufbau {
        server_addr,
        metriken,
        shutdown_tx,
        task,
    }
}

#[tokio::test]
async fn opus_rtp_ende_zu_ende() {
    let empfaenger = UdpSocket::bind(localhost(0)).await.unwrap();
    let transport = StatischerTransport::neu(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        Some(empfaenger.local_addr().unwrap().port()),
        Duration::from_millis(10),
    );
    let aufbau = bridge_starten(transport, "ende-zu-ende").await;
    let m = aufbau.metriken.clone();
    warten_bis(|| m.ziel_bekannt.get() == 1).await;

    let sender = UdpSocket::bind(localhost(0)).await.unwrap();
    for phase in 0..5 {
        sender
            .send_to(&sinus_frame(phase), aufbau.server_addr)
            .await
            .unwrap();
    }

    let mut buf = [0u8; 1500];
    for erwartet in 0..5u16 {
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), empfaenger.recv_from(&mut buf))
            .await
            .expect("RTP-Paket muss ankommen")
            .unwrap();

        let header = RtpHeader::decode(&buf[..len]).unwrap();
        assert_eq!(buf[0], 0x80);
        assert_eq!(buf[1], 0x80 | 100);
        assert_eq!(header.sequence, erwartet);
        assert_eq!(header.timestamp, u32::from(erwartet) * 960);
        assert_eq!(header.ssrc, 111_111);
        assert!(len > RtpHeader::SIZE, "Opus-Payload darf nicht leer sein");
    }

    aufbau.shutdown_tx.send(()).unwrap();
    aufbau.task.await.unwrap();
    assert_eq!(aufbau.metriken.pakete_gesendet.get(), 5);
    assert_eq!(aufbau.metriken.encode_fehler.get(), 0);
}

#[tokio::test]
async fn datagramme_ueber_frame_grenzen() {
    let empfaenger = UdpSocket::bind(localhost(0)).await.unwrap();
    let transport = StatischerTransport::neu(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        Some(empfaenger.local_addr().unwrap().port()),
        Duration::ZERO,
    );
    let aufbau = bridge_starten(transport, "stueckelung").await;
    let m = aufbau.metriken.clone();
    warten_bis(|| m.ziel_bekannt.get() == 1).await;

    // Drei Frames in Stuecken, die nicht auf Frame-Grenzen liegen
    let pcm: Vec<u8> = (0..3).flat_map(sinus_frame).collect();
    let sender = UdpSocket::bind(localhost(0)).await.unwrap();
    for stueck in pcm.chunks(1000) {
        sender.send_to(stueck, aufbau.server_addr).await.unwrap();
    }

    let mut buf = [0u8; 1500];
    let mut sequenzen = Vec::new();
    for _ in 0..3 {
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), empfaenger.recv_from(&mut buf))
            .await
            .expect("RTP-Paket muss ankommen")
            .unwrap();
        sequenzen.push(RtpHeader::decode(&buf[..len]).unwrap().sequence);
    }
    assert_eq!(sequenzen, vec![0, 1, 2]);

    aufbau.shutdown_tx.send(()).unwrap();
    aufbau.task.await.unwrap();
}

#[tokio::test]
async fn ohne_ziel_werden_pakete_verworfen() {
    let aufbau = bridge_starten(StatischerTransport::lokal(None), "ohne-ziel").await;

    let sender = UdpSocket::bind(localhost(0)).await.unwrap();
    for phase in 0..4 {
        sender
            .send_to(&sinus_frame(phase), aufbau.server_addr)
            .await
            .unwrap();
    }

    let m = aufbau.metriken.clone();
    warten_bis(|| m.pakete_ohne_ziel.get() == 4).await;
    assert_eq!(aufbau.metriken.pakete_gesendet.get(), 0);
    assert_eq!(aufbau.metriken.frames_kodiert.get(), 4);
    assert_eq!(aufbau.metriken.ziel_bekannt.get(), 0);

    aufbau.shutdown_tx.send(()).unwrap();
    aufbau.task.await.unwrap();
}
