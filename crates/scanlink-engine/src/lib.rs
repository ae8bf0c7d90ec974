//! # scanlink-engine
//!
//! Asynchronous driver for laser barcode scan engines reachable over a duplex
//! byte stream.
//!
//! The [`Engine`] turns the raw receive stream into frames, correlates each
//! command with its asynchronous response, keeps overlapping requests from
//! interleaving on the wire, and routes decoded barcodes either to the caller
//! of a trigger [`Engine::scan`] or to continuous-mode observers.
//!
//! ## Modules
//!
//! - [`transport`]: the [`Transport`] trait, a tokio stream adapter and an
//!   in-memory double
//! - [`sim`]: a simulated scan engine for tests and demos
//! - [`metrics`]: metric declarations

mod config;
mod engine;
mod error;
pub mod metrics;
mod observers;
mod read_loop;
pub mod sim;
mod slot;
mod state;
pub mod transport;

pub use config::*;
pub use engine::Engine;
pub use error::*;
pub use observers::{GoodReadHandler, SubscriptionHandle};
pub use slot::PendingKind;
pub use transport::{ChannelPeer, ChannelTransport, StreamTransport, Transport, TransportError};

pub use scanlink_protocol::{Command, Mode};
pub use tokio_util::sync::CancellationToken;
