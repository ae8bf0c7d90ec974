//! Commands that can be sent to the scan engine.
//!
//! Only the subset needed to drive scanning is modelled:
//! - Engine activation/deactivation (software trigger)
//! - Switching between trigger and continuous scanning

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ProtocolError;

/// Scanning mode of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One decode per explicit activation.
    #[default]
    Trigger,
    /// The device reports every barcode it sees on its own.
    Continuous,
}

impl Mode {
    /// Get the lowercase name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Trigger => "trigger",
            Mode::Continuous => "continuous",
        }
    }

    /// The menu setting that selects this mode.
    pub fn setting(&self) -> &'static [u8] {
        match self {
            Mode::Trigger => SETTING_TRIGGER,
            Mode::Continuous => SETTING_CONTINUOUS,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trigger" => Ok(Mode::Trigger),
            "continuous" => Ok(Mode::Continuous),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// A command sent from the host to the scan engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turn the laser on and attempt a decode.
    Activate,
    /// Turn the laser off, abandoning any decode in progress.
    Deactivate,
    /// Switch the scanning mode.
    SetMode(Mode),
}

/// Every command the engine understands, in decode priority order.
const ALL_COMMANDS: [Command; 4] = [
    Command::Activate,
    Command::Deactivate,
    Command::SetMode(Mode::Continuous),
    Command::SetMode(Mode::Trigger),
];

/// Result of trying to decode a host command from a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete command, and how many bytes it occupied.
    Command(Command, usize),
    /// The buffer holds the beginning of a command; wait for more bytes.
    Incomplete,
    /// The leading bytes do not start any known command and can be skipped.
    Garbage(usize),
}

impl Command {
    /// The command that switches the engine into `mode`.
    pub fn for_mode(mode: Mode) -> Self {
        Command::SetMode(mode)
    }

    /// Encode the command into the bytes sent on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Activate => CMD_ACTIVATE.to_vec(),
            Command::Deactivate => CMD_DEACTIVATE.to_vec(),
            Command::SetMode(mode) => {
                let setting = mode.setting();
                let mut buf = Vec::with_capacity(CMD_MENU_PREFIX.len() + setting.len());
                buf.extend_from_slice(CMD_MENU_PREFIX);
                buf.extend_from_slice(setting);
                buf
            }
        }
    }

    /// Short human-readable name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Activate => "activate",
            Command::Deactivate => "deactivate",
            Command::SetMode(Mode::Trigger) => "set-trigger",
            Command::SetMode(Mode::Continuous) => "set-continuous",
        }
    }

    /// Decode the host command at the start of `buf`.
    ///
    /// This is the device side of the protocol and is used by simulators.
    /// Unknown bytes are skipped up to the next `SYN`.
    pub fn decode(buf: &[u8]) -> DecodeResult {
        if buf.is_empty() {
            return DecodeResult::Incomplete;
        }

        let mut partial = false;
        for command in ALL_COMMANDS {
            let encoded = command.encode();
            if buf.starts_with(&encoded) {
                return DecodeResult::Command(command, encoded.len());
            }
            if encoded.starts_with(buf) {
                partial = true;
            }
        }

        if partial {
            return DecodeResult::Incomplete;
        }

        let skip = buf[1..]
            .iter()
            .position(|&b| b == SYN)
            .map(|pos| pos + 1)
            .unwrap_or(buf.len());
        DecodeResult::Garbage(skip)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_activate_and_deactivate() {
        assert_eq!(Command::Activate.encode(), vec![0x16, b'T', 0x0D]);
        assert_eq!(Command::Deactivate.encode(), vec![0x16, b'U', 0x0D]);
    }

    #[test]
    fn test_encode_mode_commands() {
        assert_eq!(
            Command::for_mode(Mode::Continuous).encode(),
            vec![0x16, b'M', 0x0D, b'p', b'a', b'p', b'p', b'm', b'3', b'!']
        );
        assert_eq!(
            Command::for_mode(Mode::Trigger).encode(),
            b"\x16M\raosdft!".to_vec()
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Continuous".parse::<Mode>().unwrap(), Mode::Continuous);
        assert_eq!(" trigger ".parse::<Mode>().unwrap(), Mode::Trigger);
        assert!("burst".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Trigger);
    }

    #[test]
    fn test_decode_commands_back_to_back() {
        let mut stream = Command::Activate.encode();
        stream.extend(Command::for_mode(Mode::Trigger).encode());

        assert_eq!(
            Command::decode(&stream),
            DecodeResult::Command(Command::Activate, 3)
        );
        assert_eq!(
            Command::decode(&stream[3..]),
            DecodeResult::Command(Command::SetMode(Mode::Trigger), 10)
        );
    }

    #[test]
    fn test_decode_partial_command() {
        assert_eq!(Command::decode(&[SYN]), DecodeResult::Incomplete);
        assert_eq!(Command::decode(b"\x16M\rpap"), DecodeResult::Incomplete);
        assert_eq!(Command::decode(b""), DecodeResult::Incomplete);
    }

    #[test]
    fn test_decode_skips_garbage_to_next_syn() {
        assert_eq!(Command::decode(b"xyz\x16T\r"), DecodeResult::Garbage(3));
        assert_eq!(Command::decode(b"hello"), DecodeResult::Garbage(5));
        assert_eq!(Command::decode(b"\x16Q\r"), DecodeResult::Garbage(3));
    }
}
