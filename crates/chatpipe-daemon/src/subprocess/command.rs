//! Command-line splitting for the child process.

use std::fmt;
use std::str::FromStr;

use super::manager::SubprocessError;

/// Program and arguments for the child process.
///
/// The source string is split on literal spaces. There is no quoting or
/// escaping, so an argument can never contain a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split `command` into program and arguments. Repeated spaces do not
    /// produce empty arguments.
    pub fn parse(command: &str) -> Result<Self, SubprocessError> {
        let mut tokens = command
            .trim()
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let program = tokens.next().ok_or(SubprocessError::EmptyCommand)?;
        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }
}

impl FromStr for CommandLine {
    type Err = SubprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
