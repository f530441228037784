//! ARVI host library
//!
//! Drives an ARVI integration from the command line, against either the
//! platform plugin or the in-memory simulated platform.

pub mod app;
pub mod cli;
pub mod commands;
pub mod error;

pub use app::{HostApp, InfoReport, Simulation};
pub use cli::{Cli, Commands};
pub use error::{CliError, Result};
