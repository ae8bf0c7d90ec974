//! Simulated scan engine.
//!
//! [`SimulatedScanner`] plays the device side of the protocol over any tokio
//! byte stream. It is used by the integration tests, by the `demo` command,
//! and behind the TCP server of the `simulate` command.

use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use scanlink_protocol::{Command, DecodeResult, Mode, ACK};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::transport::StreamTransport;

/// Buffer size of the in-memory pipe created by [`spawn_simulated`].
const PIPE_CAPACITY: usize = 4096;

/// Behaviour of the simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Barcodes reported, in rotation.
    pub barcodes: Vec<String>,
    /// Delay between activation and the decoded barcode (milliseconds).
    pub decode_delay_ms: u64,
    /// Interval between barcodes in continuous mode (milliseconds).
    pub continuous_interval_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            barcodes: vec![
                "123456789".to_string(),
                "0012345678905".to_string(),
                "SCANLINK-TEST".to_string(),
            ],
            decode_delay_ms: 50,
            continuous_interval_ms: 500,
        }
    }
}

/// What the device does in response to a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Start a decode; the barcode follows after the decode delay.
    StartDecode,
    /// Abandon any decode in progress.
    CancelDecode,
    /// Switch mode and answer with the given acknowledgement bytes.
    Acknowledge(Vec<u8>),
    /// Nothing to do.
    Ignore,
}

/// Device-side state machine of a scan engine.
#[derive(Debug, Clone)]
pub struct SimulatedScanner {
    config: SimulatorConfig,
    mode: Mode,
    next_barcode: usize,
}

impl SimulatedScanner {
    pub fn new(config: SimulatorConfig) -> Self {
        SimulatedScanner {
            config,
            mode: Mode::Trigger,
            next_barcode: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The acknowledgement the device sends for a mode change: the setting
    /// echoed in upper case, `ACK`, then `!`.
    pub fn ack_for(mode: Mode) -> Vec<u8> {
        let setting = mode.setting();
        let body = &setting[..setting.len() - 1];
        let mut ack = body.to_ascii_uppercase();
        ack.push(ACK);
        ack.push(b'!');
        ack
    }

    /// Next barcode in the rotation.
    pub fn next_barcode(&mut self) -> String {
        if self.config.barcodes.is_empty() {
            return "NOREAD".to_string();
        }
        let code = self.config.barcodes[self.next_barcode % self.config.barcodes.len()].clone();
        self.next_barcode += 1;
        code
    }

    /// Apply a host command to the device state.
    pub fn handle(&mut self, command: Command) -> Reaction {
        match command {
            Command::Activate if self.mode == Mode::Trigger => Reaction::StartDecode,
            Command::Activate => Reaction::Ignore,
            Command::Deactivate => Reaction::CancelDecode,
            Command::SetMode(mode) => {
                self.mode = mode;
                Reaction::Acknowledge(Self::ack_for(mode))
            }
        }
    }

    /// Serve the protocol on `stream` until the host disconnects.
    pub async fn run<S>(mut self, stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buf = BytesMut::with_capacity(256);

        let decode_delay = Duration::from_millis(self.config.decode_delay_ms);
        let decode = tokio::time::sleep(decode_delay);
        tokio::pin!(decode);
        let mut decoding = false;

        let period = Duration::from_millis(self.config.continuous_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                read = reader.read_buf(&mut buf) => {
                    if read? == 0 {
                        debug!("simulated scanner: host disconnected");
                        return Ok(());
                    }
                    loop {
                        match Command::decode(&buf) {
                            DecodeResult::Command(command, used) => {
                                buf.advance(used);
                                trace!("simulated scanner received {}", command);
                                match self.handle(command) {
                                    Reaction::StartDecode => {
                                        decode.as_mut().reset(Instant::now() + decode_delay);
                                        decoding = true;
                                    }
                                    Reaction::CancelDecode => decoding = false,
                                    Reaction::Acknowledge(ack) => {
                                        decoding = false;
                                        ticker.reset();
                                        writer.write_all(&ack).await?;
                                        writer.flush().await?;
                                    }
                                    Reaction::Ignore => {}
                                }
                            }
                            DecodeResult::Incomplete => break,
                            DecodeResult::Garbage(skip) => buf.advance(skip),
                        }
                    }
                }
                _ = &mut decode, if decoding => {
                    decoding = false;
                    let code = self.next_barcode();
                    writer.write_all(format!("{}\r", code).as_bytes()).await?;
                    writer.flush().await?;
                }
                _ = ticker.tick(), if self.mode == Mode::Continuous => {
                    let code = self.next_barcode();
                    writer.write_all(format!("{}\r\n", code).as_bytes()).await?;
                    writer.flush().await?;
                }
            }
        }
    }
}

/// Start a simulated scanner on an in-memory pipe and return the host end.
pub fn spawn_simulated(
    config: SimulatorConfig,
) -> (StreamTransport<DuplexStream>, JoinHandle<io::Result<()>>) {
    let (host, device) = tokio::io::duplex(PIPE_CAPACITY);
    let task = tokio::spawn(SimulatedScanner::new(config).run(device));
    (StreamTransport::new(host), task)
}
