//! The protocol engine.
//!
//! The [`Engine`] owns a transport and a background read loop. Callers issue
//! trigger scans and mode changes; the engine serializes them through a
//! single-permit gate so only one request/response interaction is on the wire
//! at a time, and correlates each with its response through a single-slot
//! mailbox resolved by the read loop.
//!
//! ```rust,ignore
//! let engine = Engine::new(StreamTransport::connect_tcp("127.0.0.1:5000").await?, EngineConfig::default());
//! let cancel = CancellationToken::new();
//!
//! let barcode = engine.scan(&cancel).await?;
//!
//! engine.subscribe(|code| println!("good read: {}", code));
//! engine.set_mode(Mode::Continuous, &cancel).await?;
//! ```

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use scanlink_protocol::{Command, Mode};
use tokio::sync::{mpsc, oneshot, Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::{CancelReason, EngineError, EngineResult};
use crate::metrics::metric_defs;
use crate::observers::{ObserverRegistry, SubscriptionHandle};
use crate::read_loop;
use crate::slot::PendingKind;
use crate::state::{EngineState, Termination};
use crate::transport::Transport;

/// State shared between callers and the read loop.
pub(crate) struct Shared {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) observers: ObserverRegistry,
}

/// Clears the correlation slot when an operation returns, on every path.
struct SlotGuard<'a>(&'a Shared);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().slot.clear();
    }
}

/// Driver for one scan engine.
///
/// Must be created inside a tokio runtime. Share it between tasks with an
/// `Arc`; every method takes `&self`.
pub struct Engine {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    /// Exclusion gate: one permit, held for the whole of a scan or mode change.
    gate: Semaphore,
    config: EngineConfig,
    stop: CancellationToken,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Start an engine on a live transport. Spawns the read loop.
    pub fn new(transport: impl Transport, config: EngineConfig) -> Self {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    /// Start an engine on a transport the caller keeps a handle to.
    pub fn with_shared_transport(transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState::default()),
            observers: ObserverRegistry::new(),
        });
        let stop = CancellationToken::new();
        let task = tokio::spawn(read_loop::run(
            shared.clone(),
            transport.clone(),
            stop.child_token(),
        ));
        info!("scan engine started in {} mode", Mode::default());

        Engine {
            shared,
            transport,
            gate: Semaphore::new(1),
            config,
            stop,
            read_task: Mutex::new(Some(task)),
        }
    }

    /// Get the current scanning mode.
    pub fn current_mode(&self) -> Mode {
        self.shared.state.lock().mode
    }

    /// Which response the engine is waiting for right now.
    pub fn pending_expectation(&self) -> PendingKind {
        self.shared.state.lock().slot.kind()
    }

    /// Whether the read loop is still running.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().terminal.is_none()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Trigger one scan and return the decoded barcode.
    ///
    /// Fails immediately with [`EngineError::InvalidState`] in continuous
    /// mode. Waits for the gate, activates the engine and suspends until the
    /// device reports a barcode, `cancel` fires, the configured scan timeout
    /// elapses, or the engine stops.
    pub async fn scan(&self, cancel: &CancellationToken) -> EngineResult<String> {
        let mode = self.current_mode();
        if mode == Mode::Continuous {
            return Err(EngineError::InvalidState {
                operation: "scan",
                mode,
            });
        }
        self.shared.state.lock().check_running()?;

        let _permit = self.acquire_gate(cancel).await?;
        let (rx, _guard) = {
            let mut state = self.shared.state.lock();
            state.check_running()?;
            if state.mode == Mode::Continuous {
                return Err(EngineError::InvalidState {
                    operation: "scan",
                    mode: state.mode,
                });
            }
            (state.slot.install_scan(), SlotGuard(&self.shared))
        };

        self.send(Command::Activate, cancel).await?;

        match self.await_reply(rx, cancel, self.config.scan_timeout()).await {
            Ok(barcode) => {
                metrics::counter!(metric_defs::SCANS_COMPLETED.name).increment(1);
                debug!("scan returned {:?}", barcode);
                Ok(barcode)
            }
            Err(err) => {
                if let EngineError::Cancelled(reason) = &err {
                    metrics::counter!(metric_defs::SCANS_CANCELLED.name).increment(1);
                    debug!("scan cancelled: {}", reason);
                    if *reason != CancelReason::Shutdown && self.config.deactivate_on_abort {
                        self.deactivate().await;
                    }
                }
                Err(err)
            }
        }
    }

    /// Switch the scanning mode.
    ///
    /// A request for the current mode succeeds without touching the wire.
    /// Otherwise the mode changes only once the device acknowledges it.
    pub async fn set_mode(&self, mode: Mode, cancel: &CancellationToken) -> EngineResult<()> {
        if self.current_mode() == mode {
            trace!("already in {} mode", mode);
            return Ok(());
        }
        self.shared.state.lock().check_running()?;

        let _permit = self.acquire_gate(cancel).await?;
        let (rx, _guard) = {
            let mut state = self.shared.state.lock();
            state.check_running()?;
            if state.mode == mode {
                return Ok(());
            }
            (state.slot.install_ack(mode), SlotGuard(&self.shared))
        };

        self.send(Command::for_mode(mode), cancel).await?;
        self.await_reply(rx, cancel, self.config.ack_timeout()).await?;

        info!("scan engine switched to {} mode", mode);
        Ok(())
    }

    // ========================================================================
    // Continuous-mode observers
    // ========================================================================

    /// Register a callback for barcodes reported in continuous mode.
    ///
    /// Callbacks run on the read-loop task in subscription order. A callback
    /// that blocks holds up every later frame, including acknowledgements.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(Arc::new(handler))
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.shared.observers.unsubscribe(handle)
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.shared.observers.len()
    }

    /// Subscribe through a channel, moving the work off the read loop.
    ///
    /// The subscription removes itself on the first good read after the
    /// receiver is dropped; the handle can also be passed to
    /// [`Engine::unsubscribe`] directly.
    pub fn good_reads(&self) -> (SubscriptionHandle, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let own_handle: Arc<OnceLock<SubscriptionHandle>> = Arc::new(OnceLock::new());
        let shared = Arc::downgrade(&self.shared);

        let slot = own_handle.clone();
        let handle = self.subscribe(move |code| {
            if tx.send(code.to_string()).is_ok() {
                return;
            }
            if let (Some(shared), Some(handle)) = (shared.upgrade(), slot.get()) {
                shared.observers.unsubscribe(*handle);
                debug!("good-read receiver dropped, removed {:?}", handle);
            }
        });
        let _ = own_handle.set(handle);
        (handle, rx)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the engine: stop the read loop, fail anything pending with
    /// [`CancelReason::Shutdown`], then close the transport.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.gate.close();
        self.stop.cancel();

        let task = self.read_task.lock().take();
        let Some(mut task) = task else {
            return;
        };
        match tokio::time::timeout(self.config.shutdown_timeout(), &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("read loop ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "read loop did not stop within {:?}, aborting",
                    self.config.shutdown_timeout()
                );
                task.abort();
            }
        }

        self.shared.state.lock().terminate(Termination::Shutdown);

        if let Err(e) = self.transport.close().await {
            warn!("closing transport failed: {}", e);
        }
        info!("scan engine shut down");
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn acquire_gate(&self, cancel: &CancellationToken) -> EngineResult<SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled(CancelReason::Requested)),
            permit = self.gate.acquire() => permit.map_err(|_| self.stopped_error()),
        }
    }

    fn stopped_error(&self) -> EngineError {
        match &self.shared.state.lock().terminal {
            Some(termination) => termination.error(),
            None => EngineError::Cancelled(CancelReason::Shutdown),
        }
    }

    /// Write a command, bounded by the write timeout.
    ///
    /// `cancel` is only honoured before the first byte goes out. A write in
    /// progress runs to completion so a truncated command never reaches the
    /// device.
    async fn send(&self, command: Command, cancel: &CancellationToken) -> EngineResult<()> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled(CancelReason::Requested));
        }

        let bytes = command.encode();
        let limit = self.config.write_timeout();
        trace!("sending {} ({} bytes)", command, bytes.len());

        match tokio::time::timeout(limit, self.transport.write(&bytes)).await {
            Ok(Ok(())) => {
                metrics::counter!(metric_defs::BYTES_WRITTEN.name).increment(bytes.len() as u64);
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("writing {} failed: {}", command, e);
                Err(e.into())
            }
            Err(_) => Err(EngineError::CommunicationFailure(format!(
                "writing {} timed out after {:?}",
                command, limit
            ))),
        }
    }

    /// Best-effort deactivation after an abandoned scan.
    async fn deactivate(&self) {
        let bytes = Command::Deactivate.encode();
        match tokio::time::timeout(self.config.write_timeout(), self.transport.write(&bytes)).await {
            Ok(Ok(())) => debug!("engine deactivated"),
            Ok(Err(e)) => warn!("deactivate failed: {}", e),
            Err(_) => warn!("deactivate timed out"),
        }
    }

    /// Wait for the read loop to resolve `rx`.
    ///
    /// On cancellation or timeout the expectation is withdrawn under the state
    /// lock; if the read loop resolved it first, that result wins.
    async fn await_reply<T>(
        &self,
        mut rx: oneshot::Receiver<EngineResult<T>>,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> EngineResult<T> {
        let reason = tokio::select! {
            biased;
            reply = &mut rx => {
                return reply.unwrap_or(Err(EngineError::Cancelled(CancelReason::Shutdown)));
            }
            _ = cancel.cancelled() => CancelReason::Requested,
            _ = deadline(timeout) => CancelReason::TimedOut,
        };

        self.shared.state.lock().slot.clear();
        match rx.try_recv() {
            Ok(reply) => reply,
            Err(_) => Err(EngineError::Cancelled(reason)),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The read loop fails anything still pending on its way out.
        self.stop.cancel();
    }
}

fn deadline(timeout: Option<Duration>) -> impl Future<Output = ()> {
    async move {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    }
}
