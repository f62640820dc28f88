//! Subprocess management: spawning, line streaming, signal relay.

pub mod command;
pub mod manager;
mod signals;

pub use command::CommandLine;
pub use manager::{ProcessState, SpawnConfig, Subprocess, SubprocessError, exit_code_from_status};
