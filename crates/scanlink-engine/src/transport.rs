//! Duplex byte transports consumed by the engine.
//!
//! The engine only needs three things from the link to the scan engine: read
//! the next chunk, write bytes, and close. [`StreamTransport`] adapts any
//! tokio byte stream (TCP socket, serial adapter, in-memory duplex pipe) and
//! [`ChannelTransport`] is a scripted double for tests and demos.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};

/// Size of a single read from a stream transport.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Errors reported by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,

    /// The transport refused the write.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// A duplex byte link to the scan engine.
///
/// Reads and writes may run concurrently from different tasks. Both are
/// cancelled by dropping the returned future; `read` must not lose data when
/// that happens.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Read the next chunk of bytes. `Ok(None)` signals end-of-stream.
    async fn read(&self) -> Result<Option<Bytes>, TransportError>;

    /// Write all of `data`.
    async fn write(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Release the underlying resources. Calling it again is a no-op.
    async fn close(&self) -> Result<(), TransportError>;
}

// ============================================================================
// Stream Transport
// ============================================================================

/// Transport over any tokio `AsyncRead + AsyncWrite` stream.
///
/// The stream is split so a write never waits behind an outstanding read.
pub struct StreamTransport<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a byte stream.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        StreamTransport {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

impl StreamTransport<TcpStream> {
    /// Connect to a TCP byte pipe, e.g. a serial-to-network bridge.
    pub async fn connect_tcp(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read(&self) -> Result<Option<Bytes>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut reader = self.reader.lock().await;
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        match reader.read_buf(&mut buf).await? {
            0 => Ok(None),
            _ => Ok(Some(buf.freeze())),
        }
    }

    async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            // The peer may already be gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Channel Transport
// ============================================================================

/// In-memory transport driven by a [`ChannelPeer`].
pub struct ChannelTransport {
    incoming: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    written: mpsc::UnboundedSender<Bytes>,
    fail_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

/// The device side of a [`ChannelTransport`].
pub struct ChannelPeer {
    incoming: Option<mpsc::UnboundedSender<Bytes>>,
    written: mpsc::UnboundedReceiver<Bytes>,
    fail_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create a connected transport/peer pair.
    pub fn pair() -> (ChannelTransport, ChannelPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        let transport = ChannelTransport {
            incoming: Mutex::new(in_rx),
            written: out_tx,
            fail_writes: fail_writes.clone(),
            closed: closed.clone(),
        };
        let peer = ChannelPeer {
            incoming: Some(in_tx),
            written: out_rx,
            fail_writes,
            closed,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn read(&self) -> Result<Option<Bytes>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut incoming = self.incoming.lock().await;
        Ok(incoming.recv().await)
    }

    async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::WriteRejected("injected write failure".into()));
        }
        self.written
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl ChannelPeer {
    /// Deliver bytes to the transport's reader. Returns `false` once the
    /// stream has been ended.
    pub fn send(&self, data: impl Into<Bytes>) -> bool {
        match &self.incoming {
            Some(tx) => tx.send(data.into()).is_ok(),
            None => false,
        }
    }

    /// End the stream; the transport reads end-of-stream after any queued data.
    pub fn end_stream(&mut self) {
        self.incoming = None;
    }

    /// Wait for the next chunk written by the host.
    pub async fn recv_written(&mut self) -> Option<Bytes> {
        self.written.recv().await
    }

    /// Take the next written chunk if one is queued.
    pub fn try_recv_written(&mut self) -> Option<Bytes> {
        self.written.try_recv().ok()
    }

    /// Concatenate every chunk written so far.
    pub fn drain_written(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(chunk) = self.written.try_recv() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Make subsequent host writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Whether the host closed the transport.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_pair_round_trip() {
        let (transport, mut peer) = ChannelTransport::pair();

        assert!(peer.send(&b"123\r"[..]));
        let chunk = transport.read().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"123\r");

        transport.write(b"\x16T\r").await.unwrap();
        assert_eq!(peer.drain_written(), b"\x16T\r");
    }

    #[tokio::test]
    async fn test_channel_end_of_stream() {
        let (transport, mut peer) = ChannelTransport::pair();
        peer.send(&b"last"[..]);
        peer.end_stream();

        assert!(transport.read().await.unwrap().is_some());
        assert!(transport.read().await.unwrap().is_none());
        assert!(!peer.send(&b"more"[..]));
    }

    #[tokio::test]
    async fn test_channel_injected_write_failure() {
        let (transport, peer) = ChannelTransport::pair();
        peer.fail_writes(true);
        assert!(matches!(
            transport.write(b"x").await,
            Err(TransportError::WriteRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_channel_close_is_idempotent() {
        let (transport, peer) = ChannelTransport::pair();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(peer.is_closed());
        assert!(matches!(transport.write(b"x").await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_stream_transport_over_duplex() {
        let (host, mut device) = tokio::io::duplex(64);
        let transport = StreamTransport::new(host);

        transport.write(b"\x16T\r").await.unwrap();
        let mut buf = [0u8; 3];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x16T\r");

        device.write_all(b"42\r").await.unwrap();
        let chunk = transport.read().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"42\r");

        drop(device);
        assert!(transport.read().await.unwrap().is_none());

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(matches!(transport.write(b"x").await, Err(TransportError::Closed)));
    }
}
