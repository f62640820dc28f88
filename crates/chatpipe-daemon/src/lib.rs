//! chatpipe Daemon Library
//!
//! Core functionality for the chatpipe bridge:
//! - Subprocess lifecycle, line streaming and signal relay
//! - Chat adapters (in-memory and NDJSON over TCP)
//! - Bridge wiring between subprocess streams, rules and the chat

pub mod adapter;
pub mod relay;
pub mod subprocess;
