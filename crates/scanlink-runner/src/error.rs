//! Errors surfaced by the command-line runner.

use scanlink_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type RunnerResult<T> = Result<T, RunnerError>;
