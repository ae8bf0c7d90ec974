//! Background task that owns the receive side of the transport.
//!
//! There is exactly one read loop per engine. It is the only code that
//! resolves expectations, and it delivers continuous-mode barcodes to the
//! observers on its own task, so a blocking observer stalls framing.

use std::sync::Arc;

use scanlink_protocol::LineFramer;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::engine::Shared;
use crate::metrics::metric_defs;
use crate::state::{Routed, Termination};
use crate::transport::Transport;

pub(crate) async fn run(shared: Arc<Shared>, transport: Arc<dyn Transport>, stop: CancellationToken) {
    let mut framer = LineFramer::new();
    debug!("read loop started");

    let termination = loop {
        let chunk = tokio::select! {
            biased;
            _ = stop.cancelled() => break Termination::Shutdown,
            chunk = transport.read() => chunk,
        };

        match chunk {
            Ok(Some(data)) => {
                trace!("read {} bytes", data.len());
                framer.push(&data);
                drain_frames(&shared, &mut framer);
            }
            Ok(None) => {
                info!("transport reached end of stream");
                break Termination::Failed("transport reached end of stream".into());
            }
            Err(e) => {
                warn!("transport read failed: {}", e);
                break Termination::Failed(format!("transport read failed: {}", e));
            }
        }
    };

    if framer.buffered_len() > 0 {
        debug!(
            "discarding {} unframed bytes: {:?}",
            framer.buffered_len(),
            framer.buffer_as_str()
        );
    }
    shared.state.lock().terminate(termination);
    debug!("read loop stopped");
}

/// Process every complete frame currently buffered.
fn drain_frames(shared: &Shared, framer: &mut LineFramer) {
    loop {
        // Framing and routing happen under one lock so the delimiter rule
        // always matches the expectation the frame resolves.
        let routed = {
            let mut state = shared.state.lock();
            let ack_pending = state.slot.is_awaiting_ack();
            let Some(frame) = framer.next_frame(ack_pending) else {
                break;
            };
            metrics::counter!(metric_defs::FRAMES_RECEIVED.name).increment(1);

            let control = frame.control_bytes();
            if control.enq {
                debug!("device sent ENQ");
            }
            if control.ack && !ack_pending {
                debug!("device sent ACK outside of a mode change");
            }
            state.route(frame)
        };

        match routed {
            Routed::AckResolved { mode, nak } => {
                metrics::counter!(metric_defs::MODE_CHANGES.name).increment(1);
                if nak {
                    warn!("mode change to {} acknowledged with NAK", mode);
                } else {
                    debug!("mode change to {} acknowledged", mode);
                }
            }
            Routed::ScanResolved { latency } => {
                metrics::histogram!(metric_defs::SCAN_LATENCY.name).record(latency.as_secs_f64());
                trace!("scan resolved after {:?}", latency);
            }
            Routed::Blank => trace!("ignoring blank frame"),
            Routed::GoodRead(text) => {
                metrics::counter!(metric_defs::GOOD_READS.name).increment(1);
                let delivered = shared.observers.notify(&text);
                trace!("good read {:?} delivered to {} observers", text, delivered);
            }
            Routed::Dropped(reason) => {
                metrics::counter!(metric_defs::FRAMES_DROPPED.name).increment(1);
                debug!("dropping frame: {}", reason);
            }
            Routed::Malformed(reason) => {
                metrics::counter!(metric_defs::FRAMES_DROPPED.name).increment(1);
                warn!("dropping malformed barcode: {}", reason);
            }
        }
    }
}
