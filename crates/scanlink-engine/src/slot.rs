//! Single-slot mailbox correlating a command with its response.
//!
//! At most one expectation exists at a time. The calling side installs it
//! while holding the exclusion gate; the read loop resolves it. Both sides
//! touch the slot only under the engine state lock, so resolution and
//! withdrawal are linearizable and an expectation is resolved at most once.

use std::time::Instant;

use scanlink_protocol::Mode;
use tokio::sync::oneshot;

use crate::error::{EngineError, EngineResult};

/// Which response, if any, the engine is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// No operation is in flight.
    None,
    /// Waiting for the acknowledgement of a mode change.
    AwaitingAck,
    /// Waiting for the barcode of a trigger scan.
    AwaitingScanResult,
}

pub(crate) enum Pending {
    None,
    AwaitingAck {
        target: Mode,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    AwaitingScanResult {
        reply: oneshot::Sender<EngineResult<String>>,
        started: Instant,
    },
}

pub(crate) struct CorrelationSlot {
    pending: Pending,
}

impl Default for CorrelationSlot {
    fn default() -> Self {
        CorrelationSlot {
            pending: Pending::None,
        }
    }
}

impl CorrelationSlot {
    pub(crate) fn kind(&self) -> PendingKind {
        match self.pending {
            Pending::None => PendingKind::None,
            Pending::AwaitingAck { .. } => PendingKind::AwaitingAck,
            Pending::AwaitingScanResult { .. } => PendingKind::AwaitingScanResult,
        }
    }

    pub(crate) fn is_awaiting_ack(&self) -> bool {
        matches!(self.pending, Pending::AwaitingAck { .. })
    }

    /// Expect the acknowledgement that switches the engine to `target`.
    pub(crate) fn install_ack(&mut self, target: Mode) -> oneshot::Receiver<EngineResult<()>> {
        debug_assert!(matches!(self.pending, Pending::None), "slot already occupied");
        let (reply, rx) = oneshot::channel();
        self.pending = Pending::AwaitingAck { target, reply };
        rx
    }

    /// Expect a decoded barcode.
    pub(crate) fn install_scan(&mut self) -> oneshot::Receiver<EngineResult<String>> {
        debug_assert!(matches!(self.pending, Pending::None), "slot already occupied");
        let (reply, rx) = oneshot::channel();
        self.pending = Pending::AwaitingScanResult {
            reply,
            started: Instant::now(),
        };
        rx
    }

    /// Take the acknowledgement expectation, leaving any other one in place.
    pub(crate) fn take_ack(&mut self) -> Option<(Mode, oneshot::Sender<EngineResult<()>>)> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::AwaitingAck { target, reply } => Some((target, reply)),
            other => {
                self.pending = other;
                None
            }
        }
    }

    /// Take the scan expectation, leaving any other one in place.
    pub(crate) fn take_scan(&mut self) -> Option<(oneshot::Sender<EngineResult<String>>, Instant)> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::AwaitingScanResult { reply, started } => Some((reply, started)),
            other => {
                self.pending = other;
                None
            }
        }
    }

    /// Withdraw whatever is pending without resolving it.
    pub(crate) fn clear(&mut self) {
        self.pending = Pending::None;
    }

    /// Resolve whatever is pending with `err`.
    pub(crate) fn fail(&mut self, err: EngineError) {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None => {}
            Pending::AwaitingAck { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Pending::AwaitingScanResult { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;

    #[test]
    fn test_install_and_take_scan() {
        let mut slot = CorrelationSlot::default();
        assert_eq!(slot.kind(), PendingKind::None);

        let mut rx = slot.install_scan();
        assert_eq!(slot.kind(), PendingKind::AwaitingScanResult);
        assert!(slot.take_ack().is_none());
        assert_eq!(slot.kind(), PendingKind::AwaitingScanResult);

        let (reply, _) = slot.take_scan().expect("scan pending");
        reply.send(Ok("42".into())).unwrap();
        assert_eq!(slot.kind(), PendingKind::None);
        assert_eq!(rx.try_recv().unwrap(), Ok("42".to_string()));
    }

    #[test]
    fn test_ack_carries_target_mode() {
        let mut slot = CorrelationSlot::default();
        let _rx = slot.install_ack(Mode::Continuous);
        assert!(slot.is_awaiting_ack());
        assert!(slot.take_scan().is_none());

        let (target, _) = slot.take_ack().expect("ack pending");
        assert_eq!(target, Mode::Continuous);
        assert!(!slot.is_awaiting_ack());
    }

    #[test]
    fn test_fail_resolves_once() {
        let mut slot = CorrelationSlot::default();
        let mut rx = slot.install_ack(Mode::Trigger);
        slot.fail(EngineError::Cancelled(CancelReason::Shutdown));
        slot.fail(EngineError::Cancelled(CancelReason::Requested));

        assert_eq!(
            rx.try_recv().unwrap(),
            Err(EngineError::Cancelled(CancelReason::Shutdown))
        );
    }

    #[test]
    fn test_clear_drops_reply() {
        let mut slot = CorrelationSlot::default();
        let mut rx = slot.install_scan();
        slot.clear();
        assert!(rx.try_recv().is_err());
        assert_eq!(slot.kind(), PendingKind::None);
    }
}
