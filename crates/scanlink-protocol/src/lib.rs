//! Scan Engine Serial Protocol
//!
//! This crate provides types and utilities for talking to a laser barcode scan
//! engine over a duplex byte stream (usually a serial link). The protocol is a
//! small, mostly textual command set with two different framing rules for the
//! data coming back from the device.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → device): fixed byte sequences starting with `SYN` (`0x16`)
//! - **Decoded barcodes** (device → host): text terminated with `\r` or `\n`
//! - **Acknowledgements** (device → host): the echoed setting, terminated with
//!   `!` or `.`
//!
//! Which delimiter set applies depends on whether the host is waiting for an
//! acknowledgement, so the [`LineFramer`] is driven with an explicit
//! `ack_pending` flag rather than tracking that state itself.
//!
//! # Example
//!
//! ```rust
//! use scanlink_protocol::{Command, LineFramer, Mode};
//!
//! // Build a command
//! let bytes = Command::for_mode(Mode::Continuous).encode();
//! assert_eq!(bytes, b"\x16M\rpappm3!");
//!
//! // Frame a decoded barcode
//! let mut framer = LineFramer::new();
//! framer.push(b"123456789\r");
//! let frame = framer.next_frame(false).unwrap();
//! assert_eq!(frame.text().unwrap(), "123456789");
//! ```

mod codec;
mod commands;
mod constants;
mod error;
mod frame;

pub use codec::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
