//! `chatpipe-ruletest`
//!
//! Checks a rules file against expected translations without running a
//! subprocess or connecting to a chat.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use chatpipe_core::RuleSet;
use chatpipe_ruletest::{TestFile, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "chatpipe-ruletest")]
#[command(version, about = "Test chatpipe translation rules offline")]
struct Args {
    /// Path to the file with translation rules
    #[arg(short = 'r', long, env = "CHATPIPE_RULES")]
    rules: PathBuf,

    /// Path to the file with test cases
    #[arg(short = 't', long)]
    test: PathBuf,
}

fn main() -> ExitCode {
    chatpipe_core::tracing_init::init_tracing("chatpipe_ruletest=warn,chatpipe_core=warn", false);
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Rule test aborted: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let rules = RuleSet::load(&args.rules).context("error loading rules")?;
    let file = TestFile::load(&args.test).context("error loading test file")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let results = TestRunner::new(&file, &rules, &mut out).run()?;
    out.flush()?;
    Ok(results.all_passed())
}
