//! Relay module: bridges subprocess I/O with the chat adapter.
//!
//! This is the "glue" that connects:
//! - Subprocess (stdout/stderr/stdin/exit event channels)
//! - RuleSet (line translation in both directions)
//! - ChatAdapter (remote chat channel)
//! - the parent's own stdio, for the operator

mod pipeline;
mod translate;

pub use pipeline::{Bridge, wait_for_exit};
pub use translate::{translate_inbound, translate_outbound};
