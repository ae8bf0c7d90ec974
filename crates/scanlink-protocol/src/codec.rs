//! Line framing for data received from the scan engine.
//!
//! The device sends two kinds of frames and the host has to know which one it
//! is waiting for:
//!
//! - While an acknowledgement is pending, frames end at `!` or `.`
//! - Otherwise frames end at `\r` or `\n`
//!
//! Exactly one delimiter byte is consumed per frame, so a `\r\n` pair yields
//! the line followed by an empty frame. Callers discard blank frames.

use bytes::{Buf, BytesMut};

use crate::constants::{ACK_DELIMITERS, INITIAL_BUFFER_CAPACITY, LINE_DELIMITERS};
use crate::frame::Frame;

/// The delimiter set in force for the given framing state.
pub fn delimiters(ack_pending: bool) -> &'static [u8] {
    if ack_pending {
        ACK_DELIMITERS
    } else {
        LINE_DELIMITERS
    }
}

/// Split one frame off the front of `buf`.
///
/// Returns the frame (delimiter stripped) and the unconsumed remainder, or
/// `None` if no delimiter has been received yet.
pub fn split_frame(buf: &[u8], ack_pending: bool) -> Option<(&[u8], &[u8])> {
    let delims = delimiters(ack_pending);
    let end = buf.iter().position(|b| delims.contains(b))?;
    Some((&buf[..end], &buf[end + 1..]))
}

/// Accumulates received bytes and hands out complete frames.
///
/// Partial frames are kept across pushes; the buffer grows as needed.
#[derive(Debug)]
pub struct LineFramer {
    /// Bytes received but not yet framed.
    buffer: BytesMut,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create a new, empty framer.
    pub fn new() -> Self {
        LineFramer {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to take the next complete frame from the buffer.
    ///
    /// `ack_pending` selects the delimiter set. Returns `None` when the buffer
    /// holds no delimiter yet; the bytes stay buffered for the next call.
    pub fn next_frame(&mut self, ack_pending: bool) -> Option<Frame> {
        let (line, _) = split_frame(&self.buffer, ack_pending)?;
        let end = line.len();

        let frame = self.buffer.split_to(end).freeze();
        self.buffer.advance(1);

        log::trace!(
            "framed {} bytes (ack_pending={}, {} left buffered)",
            frame.len(),
            ack_pending,
            self.buffer.len()
        );
        Some(Frame::new(frame))
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut LineFramer, ack_pending: bool) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Some(frame) = framer.next_frame(ack_pending) {
            frames.push(frame.as_bytes().to_vec());
        }
        frames
    }

    #[test]
    fn test_split_frame_line_mode() {
        let (frame, rest) = split_frame(b"123\rABC", false).unwrap();
        assert_eq!(frame, b"123");
        assert_eq!(rest, b"ABC");
        assert!(split_frame(b"ABC", false).is_none());
    }

    #[test]
    fn test_split_frame_ack_mode() {
        let (frame, rest) = split_frame(b"PAPPM3\x06!\r", true).unwrap();
        assert_eq!(frame, b"PAPPM3\x06");
        assert_eq!(rest, b"\r");

        let (frame, rest) = split_frame(b"OK.", true).unwrap();
        assert_eq!(frame, b"OK");
        assert!(rest.is_empty());

        // Line delimiters do not end an acknowledgement
        assert!(split_frame(b"PAPPM3\r\n", true).is_none());
    }

    #[test]
    fn test_crlf_yields_trailing_empty_frame() {
        let mut framer = LineFramer::new();
        framer.push(b"123456789\r\n");

        let frames = drain(&mut framer, false);
        assert_eq!(frames, vec![b"123456789".to_vec(), Vec::new()]);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_partial_frame_is_retained() {
        let mut framer = LineFramer::new();
        framer.push(b"1234");
        assert!(framer.next_frame(false).is_none());
        assert_eq!(framer.buffered_len(), 4);

        framer.push(b"5678");
        assert!(framer.next_frame(false).is_none());

        framer.push(b"9\r");
        let frame = framer.next_frame(false).expect("should frame");
        assert_eq!(frame.as_bytes(), b"123456789");
    }

    #[test]
    fn test_framing_rule_switches_mid_buffer() {
        let mut framer = LineFramer::new();
        framer.push(b"AOSDFT\x06!ABC\r");

        let ack = framer.next_frame(true).expect("ack frame");
        assert_eq!(ack.as_bytes(), b"AOSDFT\x06");

        let line = framer.next_frame(false).expect("line frame");
        assert_eq!(line.as_bytes(), b"ABC");
    }

    #[test]
    fn test_chunking_does_not_change_frames() {
        let stream: &[u8] = b"0001\rAB-22\n\rX\r333333333333\r";
        let mut whole = LineFramer::new();
        whole.push(stream);
        let expected = drain(&mut whole, false);
        assert_eq!(expected.len(), 5);

        for chunk_size in 1..=stream.len() {
            let mut framer = LineFramer::new();
            let mut frames = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                framer.push(chunk);
                frames.extend(drain(&mut framer, false));
            }
            assert_eq!(frames, expected, "chunk size {}", chunk_size);
            assert_eq!(framer.buffered_len(), 0);
        }
    }

    #[test]
    fn test_framer_matches_split_frame() {
        let stream: &[u8] = b"AB\rPAPPM3\x06!CD\n";
        let mut framer = LineFramer::new();
        framer.push(stream);

        let mut rest = stream;
        for ack_pending in [false, true, false] {
            let (expected, remainder) = split_frame(rest, ack_pending).unwrap();
            let frame = framer.next_frame(ack_pending).unwrap();
            assert_eq!(frame.as_bytes(), expected);
            assert_eq!(framer.buffered_len(), remainder.len());
            rest = remainder;
        }
        assert_eq!(framer.buffer_as_str(), "");
    }
}
