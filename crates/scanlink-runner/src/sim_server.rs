//! Simulated Scanner TCP Server
//!
//! Accepts TCP connections and serves each one with its own
//! [`SimulatedScanner`], so `scanlink connect` (or any serial-over-TCP tool)
//! can talk to a scanner without hardware.

use std::io;
use std::net::SocketAddr;

use scanlink_engine::sim::{SimulatedScanner, SimulatorConfig};
use scanlink_engine::CancellationToken;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info, warn};

/// A bound listener that hands out simulated scanners.
pub struct SimServer {
    listener: TcpListener,
    config: SimulatorConfig,
}

impl SimServer {
    /// Bind the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs, config: SimulatorConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(SimServer { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires.
    pub async fn serve(self, shutdown: CancellationToken) -> io::Result<()> {
        info!("simulated scanner listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted?,
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!("set_nodelay failed for {}: {}", peer, e);
            }
            info!("client connected from {}", peer);

            let scanner = SimulatedScanner::new(self.config.clone());
            let stop = shutdown.child_token();
            tokio::spawn(async move {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    result = scanner.run(stream) => match result {
                        Ok(()) => info!("client {} disconnected", peer),
                        Err(e) => warn!("connection error with {}: {}", peer, e),
                    },
                }
            });
        }

        info!("simulated scanner server stopped");
        Ok(())
    }
}
