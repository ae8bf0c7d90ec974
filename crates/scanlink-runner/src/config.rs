//! Configuration file for the `scanlink` binary.
//!
//! ```yaml
//! engine:
//!   scan_timeout_ms: 10000
//!   ack_timeout_ms: 3000
//! simulator:
//!   barcodes: ["123456789", "0012345678905"]
//!   decode_delay_ms: 50
//! ```
//!
//! Every field is optional; missing sections take their defaults.

use std::path::Path;

use scanlink_engine::sim::SimulatorConfig;
use scanlink_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::RunnerResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanlinkConfig {
    /// Engine timeouts and abort behaviour.
    pub engine: EngineConfig,
    /// Device behaviour for `demo` and `simulate`.
    pub simulator: SimulatorConfig,
}

impl ScanlinkConfig {
    /// Parse a configuration from YAML text. Empty text yields the defaults.
    pub fn from_yaml_str(text: &str) -> RunnerResult<Self> {
        if text.trim().is_empty() {
            return Ok(ScanlinkConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> RunnerResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(ScanlinkConfig::default()),
        }
    }
}
