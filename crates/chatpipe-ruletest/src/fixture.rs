//! Test file format.
//!
//! ```json
//! {
//!   "Tests": {
//!     "ChatToSubprocess": [{"Input": "hi", "Expect": "say hi", "UserProps": "bob"}],
//!     "SubprocessToChat": [{"Input": "<Bob> hi", "Expect": "Bob: hi"}]
//!   },
//!   "UserProps": {"bob": {"Author": {"Username": "Bob"}}}
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use chatpipe_core::Props;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a test file.
#[derive(Debug, Error)]
pub enum RuleTestError {
    #[error("Failed to read test file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse test file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid test file: {0}")]
    Invalid(String),
}

/// Root of a test file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestFile {
    /// Absent `Tests` is a validation error, not an empty suite.
    pub tests: Option<TestCases>,
    /// Named author contexts referenced by inbound cases.
    #[serde(default)]
    pub user_props: HashMap<String, Props>,
}

/// Cases for both translation directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCases {
    #[serde(rename = "ChatToSubprocess", alias = "DiscordToSubprocess", default)]
    pub chat_to_subprocess: Vec<InboundCase>,
    #[serde(rename = "SubprocessToChat", alias = "SubprocessToDiscord", default)]
    pub subprocess_to_chat: Vec<OutboundCase>,
}

/// Chat message → subprocess stdin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundCase {
    pub input: String,
    #[serde(default)]
    pub expect: String,
    /// Key into [`TestFile::user_props`].
    #[serde(default)]
    pub user_props: String,
}

/// Subprocess line → chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutboundCase {
    pub input: String,
    #[serde(default)]
    pub expect: String,
}

impl TestFile {
    /// Read, parse and validate a test file.
    pub fn load(path: &Path) -> Result<Self, RuleTestError> {
        let content = std::fs::read_to_string(path).map_err(|e| RuleTestError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file: Self = serde_json::from_str(&content).map_err(|e| RuleTestError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Structural checks. Unknown `UserProps` keys are left to the runner,
    /// which reports them as failed cases.
    pub fn validate(&self) -> Result<(), RuleTestError> {
        let Some(tests) = &self.tests else {
            return Err(RuleTestError::Invalid("missing field \"Tests\"".to_string()));
        };
        for (i, case) in tests.chat_to_subprocess.iter().enumerate() {
            if case.input.is_empty() {
                return Err(RuleTestError::Invalid(format!(
                    "ChatToSubprocess test #{i}: \"Input\" must not be empty"
                )));
            }
            if case.user_props.is_empty() {
                return Err(RuleTestError::Invalid(format!(
                    "ChatToSubprocess test #{i}: \"UserProps\" must name an entry"
                )));
            }
        }
        for (i, case) in tests.subprocess_to_chat.iter().enumerate() {
            if case.input.is_empty() {
                return Err(RuleTestError::Invalid(format!(
                    "SubprocessToChat test #{i}: \"Input\" must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// The validated cases. Empty when `Tests` is absent.
    pub fn cases(&self) -> TestCases {
        self.tests.clone().unwrap_or_default()
    }
}
