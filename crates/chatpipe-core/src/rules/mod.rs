//! Line translation rules.
//!
//! A rule pairs a regular expression with a replacement template. Rules are
//! evaluated in declaration order and the first rule whose pattern matches
//! anywhere in the input wins. An empty result means "forward nothing".

mod pattern;
mod template;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use pattern::Pattern;
pub use template::{Author, ESCAPE, Props, expand_template};

/// One translation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Pattern the input must contain.
    #[serde(rename = "Match")]
    pub pattern: Pattern,
    /// Replacement template, see [`expand_template`] for the escapes.
    #[serde(rename = "Template")]
    pub template: String,
}

impl Rule {
    /// Build a rule from a pattern string and template.
    pub fn new(
        pattern: &str,
        template: impl Into<String>,
    ) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
            template: template.into(),
        })
    }

    /// Apply this rule to `input`. `None` if the pattern does not match.
    ///
    /// Every match in `input` is replaced by the expanded template.
    pub fn apply(&self, input: &str, props: Option<&Props>) -> Option<String> {
        if !self.pattern.is_match(input) {
            return None;
        }
        let template = expand_template(&self.template, props);
        Some(self.pattern.replace_all(input, &template))
    }
}

/// Translate `input` with the first matching rule, or return `""` if no
/// rule matches.
pub fn apply_rules(rules: &[Rule], props: Option<&Props>, input: &str) -> String {
    rules
        .iter()
        .find_map(|rule| rule.apply(input, props))
        .unwrap_or_default()
}

/// Both directions of translation, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Chat messages → subprocess stdin.
    #[serde(rename = "ChatToSubprocess", alias = "DiscordToSubprocess", default)]
    pub chat_to_subprocess: Vec<Rule>,
    /// Subprocess output → chat messages.
    #[serde(rename = "SubprocessToChat", alias = "SubprocessToDiscord", default)]
    pub subprocess_to_chat: Vec<Rule>,
}

impl RuleSet {
    /// Load a rules file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Rules {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rules = Self::from_json(&content).map_err(|e| Error::Rules {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(
            path = %path.display(),
            inbound = rules.chat_to_subprocess.len(),
            outbound = rules.subprocess_to_chat.len(),
            "Loaded rules"
        );
        Ok(rules)
    }

    /// Parse rules from a JSON document.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Translate a chat message for the subprocess.
    pub fn inbound(&self, props: &Props, input: &str) -> String {
        apply_rules(&self.chat_to_subprocess, Some(props), input)
    }

    /// Translate a subprocess line for the chat.
    pub fn outbound(&self, input: &str) -> String {
        apply_rules(&self.subprocess_to_chat, None, input)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rule(pattern: &str, template: &str) -> Rule {
        Rule::new(pattern, template).unwrap()
    }

    fn alice() -> Props {
        Props::new(Author {
            username: "Alice".to_string(),
            discriminator: "0042".to_string(),
            accent_color: 0x00_12AB,
        })
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            rule("^never$", "nope"),
            rule("hello", "first"),
            rule("hello", "second"),
        ];
        assert_eq!(apply_rules(&rules, None, "hello"), "first");
    }

    #[test]
    fn matching_is_not_anchored() {
        let rules = vec![rule("ERROR", "!")];
        assert_eq!(apply_rules(&rules, None, "[main] ERROR disk full"), "[main] ! disk full");
    }

    #[test]
    fn no_match_yields_empty() {
        let rules = vec![rule("^a$", "b")];
        assert_eq!(apply_rules(&rules, None, "c"), "");
        assert_eq!(apply_rules(&[], None, "anything"), "");
    }

    #[test]
    fn empty_result_from_first_match_is_final() {
        let rules = vec![rule("^noise", ""), rule(".*", "fallback")];
        assert_eq!(apply_rules(&rules, None, "noise here"), " here");

        let rules = vec![rule("^.*$", ""), rule(".*", "fallback")];
        assert_eq!(apply_rules(&rules, None, "dropped"), "");
    }

    #[test]
    fn every_match_is_replaced() {
        let rules = vec![rule("o", "0")];
        assert_eq!(apply_rules(&rules, None, "foo boo"), "f00 b00");
    }

    #[test]
    fn capture_groups_reach_regex_substitution() {
        let rules = vec![rule(r"^<(\w+)> (.*)$", "[${1}] ${2}")];
        assert_eq!(apply_rules(&rules, None, "<steve> hi all"), "[steve] hi all");
    }

    #[test]
    fn greeting_uses_author_name() {
        let rules = vec![rule("^hello$", "Hello, ^U!")];
        assert_eq!(apply_rules(&rules, Some(&alice()), "hello"), "Hello, Alice!");
    }

    #[test]
    fn props_and_captures_combine() {
        let rules = vec![rule("^(.*)$", "say <^U#^T:^C> ${1}")];
        assert_eq!(
            apply_rules(&rules, Some(&alice()), "hi there"),
            "say <Alice#0042:12ab> hi there"
        );
    }

    #[test]
    fn absent_props_keep_placeholders_literal() {
        let rules = vec![rule("^(.*)$", "^U: ${1}")];
        assert_eq!(apply_rules(&rules, None, "server started"), "^U: server started");
    }

    #[test]
    fn rule_apply_reports_miss() {
        let r = rule("x", "y");
        assert_eq!(r.apply("abc", None), None);
        assert_eq!(r.apply("axc", None), Some("ayc".to_string()));
    }

    #[test]
    fn ruleset_parses_both_directions() {
        let rules = RuleSet::from_json(
            r#"{
                "ChatToSubprocess": [{"Match": "^(.*)$", "Template": "say ^U: ${1}"}],
                "SubprocessToChat": [{"Match": "joined", "Template": "JOINED"}]
            }"#,
        )
        .unwrap();
        assert_eq!(rules.inbound(&alice(), "hey"), "say Alice: hey");
        assert_eq!(rules.outbound("bob joined"), "bob JOINED");
        assert_eq!(rules.outbound("bob left"), "");
    }

    #[test]
    fn ruleset_accepts_discord_field_names() {
        let rules = RuleSet::from_json(
            r#"{
                "DiscordToSubprocess": [{"Match": "a", "Template": "b"}],
                "SubprocessToDiscord": []
            }"#,
        )
        .unwrap();
        assert_eq!(rules.chat_to_subprocess.len(), 1);
        assert!(rules.subprocess_to_chat.is_empty());
    }

    #[test]
    fn ruleset_missing_lists_default_to_empty() {
        let rules = RuleSet::from_json("{}").unwrap();
        assert_eq!(rules, RuleSet::default());
    }

    #[test]
    fn ruleset_rejects_bad_regex() {
        let err = RuleSet::from_json(r#"{"ChatToSubprocess": [{"Match": "[", "Template": ""}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("invalid regular expression"));
    }
}
