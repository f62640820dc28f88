//! `chatpipe` Core Library
//!
//! Shared functionality for `chatpipe` components:
//! - Multi-subscriber event broadcast channel
//! - Translation rules (regex match + template substitution)
//! - Settings resolution
//! - Common error types

pub mod broadcast;
pub mod config;
pub mod error;
pub mod rules;
pub mod tracing_init;

pub use broadcast::{EventChannel, Listener};
pub use config::Settings;
pub use error::{Error, Result};
pub use rules::{Author, Pattern, Props, Rule, RuleSet, apply_rules, expand_template};
