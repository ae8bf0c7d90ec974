//! Engine-owned state and frame routing.

use std::time::Duration;

use scanlink_protocol::{Frame, Mode};

use crate::error::{CancelReason, EngineError, EngineResult};
use crate::slot::CorrelationSlot;

/// Why the read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The engine was shut down.
    Shutdown,
    /// The transport ended or failed.
    Failed(String),
}

impl Termination {
    /// The error every later operation fails with.
    pub(crate) fn error(&self) -> EngineError {
        match self {
            Termination::Shutdown => EngineError::Cancelled(CancelReason::Shutdown),
            Termination::Failed(reason) => EngineError::CommunicationFailure(reason.clone()),
        }
    }
}

/// What the router did with a frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Routed {
    /// A mode change was acknowledged and applied.
    AckResolved { mode: Mode, nak: bool },
    /// A trigger scan received its barcode.
    ScanResolved { latency: Duration },
    /// Whitespace-only frame, e.g. the tail of a `\r\n` pair.
    Blank,
    /// A continuous-mode barcode for the observers.
    GoodRead(String),
    /// Nobody wanted the frame.
    Dropped(String),
    /// A continuous-mode frame that is not valid text.
    Malformed(String),
}

pub(crate) struct EngineState {
    pub(crate) mode: Mode,
    pub(crate) slot: CorrelationSlot,
    pub(crate) terminal: Option<Termination>,
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState {
            mode: Mode::Trigger,
            slot: CorrelationSlot::default(),
            terminal: None,
        }
    }
}

impl EngineState {
    /// Fail if the read loop has stopped.
    pub(crate) fn check_running(&self) -> EngineResult<()> {
        match &self.terminal {
            Some(termination) => Err(termination.error()),
            None => Ok(()),
        }
    }

    /// Enter the terminal state (first reason wins) and fail anything pending.
    pub(crate) fn terminate(&mut self, termination: Termination) {
        let termination = self.terminal.get_or_insert(termination).clone();
        self.slot.fail(termination.error());
    }

    /// Route one frame according to the pending expectation and mode.
    pub(crate) fn route(&mut self, frame: Frame) -> Routed {
        if let Some((target, reply)) = self.slot.take_ack() {
            // Only the arrival of the acknowledgement matters, not its content.
            self.mode = target;
            let _ = reply.send(Ok(()));
            return Routed::AckResolved {
                mode: target,
                nak: frame.control_bytes().nak,
            };
        }

        if frame.is_blank() {
            return Routed::Blank;
        }

        if self.mode == Mode::Trigger {
            if let Some((reply, started)) = self.slot.take_scan() {
                let result = frame
                    .text()
                    .map_err(|e| EngineError::ProtocolViolation(e.to_string()));
                return match reply.send(result) {
                    Ok(()) => Routed::ScanResolved {
                        latency: started.elapsed(),
                    },
                    Err(_) => Routed::Dropped("scan caller went away".into()),
                };
            }
            return Routed::Dropped(format!(
                "no scan waiting for {:?}",
                frame.lossy_text()
            ));
        }

        match frame.text() {
            Ok(text) => Routed::GoodRead(text),
            Err(e) => Routed::Malformed(format!("{} ({:?})", e, frame.lossy_text())),
        }
    }
}
