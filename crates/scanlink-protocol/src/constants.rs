//! Protocol constants
//!
//! Byte values and fixed command sequences understood by the scan engine.

// ============================================================================
// Control Bytes
// ============================================================================

/// Synchronous idle, prefixes every host command.
pub const SYN: u8 = 0x16;
/// Carriage return.
pub const CR: u8 = 0x0D;
/// Line feed.
pub const LF: u8 = 0x0A;
/// Positive acknowledgement from the device.
pub const ACK: u8 = 0x06;
/// Negative acknowledgement from the device.
pub const NAK: u8 = 0x15;
/// Enquiry (status request) from the device.
pub const ENQ: u8 = 0x05;

// ============================================================================
// Command Sequences (host → device)
// ============================================================================

/// Activate the engine (trigger a single scan).
pub const CMD_ACTIVATE: &[u8] = &[SYN, b'T', CR];
/// Deactivate the engine (stop a pending scan).
pub const CMD_DEACTIVATE: &[u8] = &[SYN, b'U', CR];
/// Prefix for every menu (mode change) command.
pub const CMD_MENU_PREFIX: &[u8] = &[SYN, b'M', CR];

/// Menu setting that enables continuous (presentation) scanning.
pub const SETTING_CONTINUOUS: &[u8] = b"pappm3!";
/// Menu setting that enables manual trigger scanning.
pub const SETTING_TRIGGER: &[u8] = b"aosdft!";

// ============================================================================
// Frame Delimiters (device → host)
// ============================================================================

/// Delimiters that end an acknowledgement frame.
pub const ACK_DELIMITERS: &[u8] = b"!.";
/// Delimiters that end a decoded-data frame.
pub const LINE_DELIMITERS: &[u8] = &[CR, LF];

/// Capacity reserved up front for the receive buffer.
pub const INITIAL_BUFFER_CAPACITY: usize = 256;
