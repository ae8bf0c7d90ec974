//! # scanlink-runner
//!
//! Interactive front end for the scan engine and a TCP server that exposes
//! simulated scanners.
//!
//! - [`config`]: YAML configuration file
//! - [`menu`]: the interactive console menu
//! - [`sim_server`]: one simulated scanner per TCP connection

pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod sim_server;

pub use config::ScanlinkConfig;
pub use error::RunnerError;
