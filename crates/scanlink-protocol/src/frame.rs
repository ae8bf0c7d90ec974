//! Frames received from the scan engine.

use bytes::Bytes;

use crate::constants::{ACK, ENQ, NAK};
use crate::error::{ProtocolError, ProtocolResult};

/// One protocol unit extracted from the receive stream, delimiter stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame(Bytes);

/// Device control bytes found inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlBytes {
    /// The frame carries an `ACK`.
    pub ack: bool,
    /// The frame carries a `NAK`.
    pub nak: bool,
    /// The frame carries an `ENQ`.
    pub enq: bool,
}

impl ControlBytes {
    /// Whether no control byte was present.
    pub fn is_empty(&self) -> bool {
        !(self.ack || self.nak || self.enq)
    }
}

impl Frame {
    /// Create a frame from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Frame(data.into())
    }

    /// The raw frame contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the frame is empty once surrounding whitespace is removed.
    ///
    /// Uses the same trimming rule as [`Frame::text`]. A `\r\n` pair produces
    /// such a frame after the line frame it ends.
    pub fn is_blank(&self) -> bool {
        std::str::from_utf8(&self.0).map_or(false, |s| s.trim().is_empty())
    }

    /// The decoded text with surrounding whitespace trimmed.
    pub fn text(&self) -> ProtocolResult<String> {
        std::str::from_utf8(&self.0)
            .map(|s| s.trim().to_string())
            .map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// The frame as text, with invalid UTF-8 replaced (for diagnostics).
    pub fn lossy_text(&self) -> String {
        String::from_utf8_lossy(&self.0).trim().to_string()
    }

    /// Report which device control bytes appear in the frame.
    pub fn control_bytes(&self) -> ControlBytes {
        let mut found = ControlBytes::default();
        for &byte in self.0.iter() {
            match byte {
                ACK => found.ack = true,
                NAK => found.nak = true,
                ENQ => found.enq = true,
                _ => {}
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_trimmed() {
        let frame = Frame::new(&b"  0123456789 \t"[..]);
        assert_eq!(frame.text().unwrap(), "0123456789");
    }

    #[test]
    fn test_invalid_utf8() {
        let frame = Frame::new(vec![0xFF, 0xFE, b'1']);
        assert_eq!(frame.text(), Err(ProtocolError::InvalidUtf8));
        assert!(frame.lossy_text().ends_with('1'));
    }

    #[test]
    fn test_blank_frames() {
        assert!(Frame::default().is_blank());
        assert!(Frame::new(&b" \n"[..]).is_blank());
        assert!(!Frame::new(&b"A"[..]).is_blank());
        assert!(!Frame::new(vec![0xFF]).is_blank());
    }

    #[test]
    fn test_blank_agrees_with_text() {
        // Vertical tab and NBSP are whitespace to `str::trim` but not ASCII
        // whitespace.
        for raw in [&b"\x0b"[..], "\u{a0}".as_bytes(), "\t\u{2003}\r".as_bytes()] {
            let frame = Frame::new(raw.to_vec());
            assert!(frame.is_blank(), "{:?}", raw);
            assert_eq!(frame.text().unwrap(), "");
        }
    }

    #[test]
    fn test_control_bytes() {
        let frame = Frame::new(&b"PAPPM3\x06"[..]);
        let control = frame.control_bytes();
        assert!(control.ack);
        assert!(!control.nak);
        assert!(!control.enq);

        assert!(Frame::new(&b"AOSDFT\x15"[..]).control_bytes().nak);
        assert!(Frame::new(&b"1234"[..]).control_bytes().is_empty());
    }
}
