//! Runs test cases through a [`RuleSet`] and reports the outcome.

use std::io::{self, Write};

use chatpipe_core::RuleSet;
use tracing::debug;

use crate::fixture::{InboundCase, OutboundCase, TestFile};

/// Pass/fail tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestResults {
    pub passed: usize,
    pub failed: usize,
}

impl TestResults {
    pub const fn add(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
    }

    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }

    const fn record(&mut self, pass: bool) {
        if pass {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Runs every case of a [`TestFile`] against a [`RuleSet`], writing a
/// human-readable report to `out`.
pub struct TestRunner<'a, W> {
    file: &'a TestFile,
    rules: &'a RuleSet,
    out: W,
}

impl<'a, W: Write> TestRunner<'a, W> {
    pub const fn new(file: &'a TestFile, rules: &'a RuleSet, out: W) -> Self {
        Self { file, rules, out }
    }

    /// Run outbound cases, then inbound cases, then print totals.
    pub fn run(&mut self) -> io::Result<TestResults> {
        let cases = self.file.cases();
        let mut results = TestResults::default();
        results.add(self.run_outbound(&cases.subprocess_to_chat)?);
        results.add(self.run_inbound(&cases.chat_to_subprocess)?);
        writeln!(
            self.out,
            "Finished: Tests passed: {}, failed: {}",
            results.passed, results.failed
        )?;
        Ok(results)
    }

    fn run_outbound(&mut self, cases: &[OutboundCase]) -> io::Result<TestResults> {
        self.banner("SubprocessToChat", cases.len())?;
        let mut results = TestResults::default();
        for (number, case) in cases.iter().enumerate() {
            let got = self.rules.outbound(&case.input);
            let pass = self.report("SubprocessToChat", number, &case.input, &case.expect, &got)?;
            results.record(pass);
        }
        Ok(results)
    }

    fn run_inbound(&mut self, cases: &[InboundCase]) -> io::Result<TestResults> {
        self.banner("ChatToSubprocess", cases.len())?;
        let mut results = TestResults::default();
        for (number, case) in cases.iter().enumerate() {
            let Some(props) = self.file.user_props.get(&case.user_props) else {
                writeln!(
                    self.out,
                    "FAIL  ChatToSubprocess test #{number}: bad test: missing UserProps {:?}",
                    case.user_props
                )?;
                results.record(false);
                continue;
            };
            let got = self.rules.inbound(props, &case.input);
            let pass = self.report("ChatToSubprocess", number, &case.input, &case.expect, &got)?;
            results.record(pass);
        }
        Ok(results)
    }

    fn banner(&mut self, title: &str, count: usize) -> io::Result<()> {
        let text = format!("{title} tests: Running {count} tests");
        let line = "-".repeat(text.len());
        writeln!(self.out, "{line}\n{text}\n{line}")
    }

    fn report(
        &mut self,
        direction: &str,
        number: usize,
        input: &str,
        expect: &str,
        got: &str,
    ) -> io::Result<bool> {
        if got == expect {
            writeln!(self.out, "PASS  {direction} test #{number}")?;
            return Ok(true);
        }
        debug!(direction, number, "Rule test failed");
        writeln!(
            self.out,
            "FAIL  {direction} test #{number}:\n\tInput:\t\t{input}\n\tExpected:\t{expect}\n\tGot:\t\t{got}"
        )?;
        Ok(false)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::from_json(
            r#"{
                "ChatToSubprocess": [{"Match": "^(.*)$", "Template": "say <^U> ${1}"}],
                "SubprocessToChat": [{"Match": "^<(\\w+)> (.*)$", "Template": "${1}: ${2}"}]
            }"#,
        )
        .unwrap()
    }

    fn run(file_json: &str) -> (TestResults, String) {
        let file: TestFile = serde_json::from_str(file_json).unwrap();
        let rules = rules();
        let mut out = Vec::new();
        let results = TestRunner::new(&file, &rules, &mut out).run().unwrap();
        (results, String::from_utf8(out).unwrap())
    }

    #[test]
    fn counts_passes_and_failures() {
        let (results, out) = run(
            r#"{
                "Tests": {
                    "SubprocessToChat": [
                        {"Input": "<Steve> hi", "Expect": "Steve: hi"},
                        {"Input": "joined", "Expect": "nope"}
                    ],
                    "ChatToSubprocess": [{"Input": "yo", "Expect": "say <Bob> yo", "UserProps": "bob"}]
                },
                "UserProps": {"bob": {"Author": {"Username": "Bob"}}}
            }"#,
        );
        assert_eq!(results, TestResults { passed: 2, failed: 1 });
        assert!(!results.all_passed());
        assert!(out.contains("SubprocessToChat tests: Running 2 tests"));
        assert!(out.contains("FAIL  SubprocessToChat test #1"));
        assert!(out.contains("\tExpected:\tnope\n\tGot:\t\t"));
        assert!(out.ends_with("Finished: Tests passed: 2, failed: 1\n"));
    }

    #[test]
    fn missing_user_props_fails_the_case() {
        let (results, out) = run(
            r#"{"Tests": {"ChatToSubprocess": [{"Input": "yo", "Expect": "x", "UserProps": "ghost"}]}}"#,
        );
        assert_eq!(results, TestResults { passed: 0, failed: 1 });
        assert!(out.contains("missing UserProps \"ghost\""));
    }

    #[test]
    fn banner_is_framed_by_dashes() {
        let (results, out) = run(r#"{"Tests": {}}"#);
        assert!(results.all_passed());
        let mut lines = out.lines();
        let top = lines.next().unwrap();
        let title = lines.next().unwrap();
        assert_eq!(title, "SubprocessToChat tests: Running 0 tests");
        assert_eq!(top.len(), title.len());
        assert!(top.chars().all(|c| c == '-'));
    }

    #[test]
    fn results_add_up() {
        let mut total = TestResults { passed: 1, failed: 2 };
        total.add(TestResults { passed: 3, failed: 0 });
        assert_eq!(total, TestResults { passed: 4, failed: 2 });
    }
}
