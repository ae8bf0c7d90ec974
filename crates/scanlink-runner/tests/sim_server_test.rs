//! End-to-end tests: engine over TCP against the simulated scanner server.

use std::time::Duration;

use scanlink_engine::sim::SimulatorConfig;
use scanlink_engine::{CancellationToken, Engine, EngineConfig, Mode, StreamTransport};
use scanlink_runner::sim_server::SimServer;

const STEP: Duration = Duration::from_secs(5);

async fn start_server(barcodes: &[&str]) -> (std::net::SocketAddr, CancellationToken) {
    let config = SimulatorConfig {
        barcodes: barcodes.iter().map(|b| b.to_string()).collect(),
        decode_delay_ms: 5,
        continuous_interval_ms: 10,
    };
    let server = SimServer::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.serve(shutdown.clone()));
    (addr, shutdown)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_over_tcp() {
    let (addr, shutdown) = start_server(&["TCP-001", "TCP-002"]).await;

    let transport = StreamTransport::connect_tcp(addr).await.unwrap();
    let engine = Engine::new(transport, EngineConfig::default());
    let cancel = CancellationToken::new();

    let first = tokio::time::timeout(STEP, engine.scan(&cancel)).await.unwrap().unwrap();
    let second = tokio::time::timeout(STEP, engine.scan(&cancel)).await.unwrap().unwrap();
    assert_eq!(first, "TCP-001");
    assert_eq!(second, "TCP-002");

    engine.shutdown().await;
    shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_each_connection_gets_its_own_scanner() {
    let (addr, shutdown) = start_server(&["ONLY"]).await;

    let a = Engine::new(StreamTransport::connect_tcp(addr).await.unwrap(), EngineConfig::default());
    let b = Engine::new(StreamTransport::connect_tcp(addr).await.unwrap(), EngineConfig::default());
    let cancel = CancellationToken::new();

    tokio::time::timeout(STEP, a.set_mode(Mode::Continuous, &cancel))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.current_mode(), Mode::Continuous);

    // The second scanner is still in trigger mode.
    let barcode = tokio::time::timeout(STEP, b.scan(&cancel)).await.unwrap().unwrap();
    assert_eq!(barcode, "ONLY");

    a.shutdown().await;
    b.shutdown().await;
    shutdown.cancel();
}
