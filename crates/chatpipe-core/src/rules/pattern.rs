//! Regular expression that serializes as its literal pattern string.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compiled regular expression usable directly as a rules-file field.
///
/// Compilation happens eagerly on deserialization, so a malformed pattern
/// fails the whole load instead of surfacing at match time.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    /// The source pattern string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// True if the pattern matches anywhere in `input`.
    pub fn is_match(&self, input: &str) -> bool {
        self.0.is_match(input)
    }

    /// Replace every match in `input`, resolving `$1` / `${name}` references
    /// in `replacement` against each match's capture groups.
    pub fn replace_all(&self, input: &str, replacement: &str) -> String {
        self.0.replace_all(input, replacement).into_owned()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl FromStr for Pattern {
    type Err = regex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(|e| {
            serde::de::Error::custom(format!("invalid regular expression {raw:?}: {e}"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_source_string() {
        let pattern = Pattern::new(r"^(\w+) joined$").unwrap();
        let json = serde_json::to_string(&pattern).unwrap();
        assert_eq!(json, r#""^(\\w+) joined$""#);

        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = serde_json::from_str::<Pattern>(r#""(unclosed""#).unwrap_err();
        assert!(err.to_string().contains("invalid regular expression"));
    }

    #[test]
    fn replace_all_expands_capture_groups() {
        let pattern: Pattern = r"(\w+)=(\d+)".parse().unwrap();
        assert_eq!(pattern.replace_all("a=1 b=2", "${2}:${1}"), "1:a 2:b");
    }
}
