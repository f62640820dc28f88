//! Offline harness for chatpipe translation rules.
//!
//! Loads a rules file and a test file, runs every case through the rule
//! engine and reports pass/fail per case.

pub mod fixture;
pub mod runner;

pub use fixture::{InboundCase, OutboundCase, RuleTestError, TestCases, TestFile};
pub use runner::{TestResults, TestRunner};
