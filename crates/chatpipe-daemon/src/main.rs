//! `chatpipe` daemon
//!
//! Runs a command as a child process, mirrors its stdio locally and relays
//! translated lines between it and a chat channel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use chatpipe_core::RuleSet;
use chatpipe_core::Settings;
use chatpipe_core::config::load_settings;
use chatpipe_daemon::adapter::TcpAdapter;
use chatpipe_daemon::relay::{Bridge, wait_for_exit};
use chatpipe_daemon::subprocess::{CommandLine, SpawnConfig, Subprocess};

#[derive(Parser, Debug)]
#[command(name = "chatpipe")]
#[command(version, about = "Bridge a command's stdio with a chat channel")]
struct Args {
    /// Settings file (JSON). Defaults to the global settings file if present.
    #[arg(long, env = "CHATPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the file with translation rules
    #[arg(short = 'r', long, env = "CHATPIPE_RULES")]
    rules: PathBuf,

    /// Chat channel to relay to and from
    #[arg(short = 'i', long = "channel-id")]
    channel_id: Option<String>,

    /// Chat gateway address (`host:port`) for the TCP adapter
    #[arg(long)]
    adapter_addr: Option<String>,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    /// Command to run, split on spaces (no quoting)
    command: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref()).context("error loading settings")?;
    apply_cli_overrides(&mut settings, &args);

    let log_filter = format!(
        "chatpipe_daemon={level},chatpipe_core={level}",
        level = settings.log_level
    );
    chatpipe_core::tracing_init::init_tracing(&log_filter, settings.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = %args.command,
        relay = settings.adapter_addr.is_some(),
        "Starting chatpipe"
    );

    let rules = RuleSet::load(&args.rules).context("error loading rules")?;
    let command = CommandLine::parse(&args.command).context("invalid command")?;
    let subprocess = Arc::new(Subprocess::new(
        SpawnConfig::new(command)
            .with_listener_capacity(settings.listener_capacity)
            .with_drain_timeout(settings.drain_timeout()),
    ));

    // Register for the exit event before anything can make the child exit.
    let exit_listener = subprocess.exit().listen();

    let relay_channel_id = settings.relay_channel_id.clone().unwrap_or_default();
    let bridge = Bridge::new(Arc::clone(&subprocess), rules, relay_channel_id);
    bridge.mirror_local_output();

    subprocess.start().context("error starting command")?;
    bridge.forward_local_input();

    match (&settings.adapter_addr, &settings.relay_channel_id) {
        (Some(addr), Some(_)) => match TcpAdapter::connect(addr).await {
            Ok(adapter) => bridge.attach(Arc::new(adapter)),
            // The command keeps running without the chat relay.
            Err(e) => error!(error = %e, "Failed to start chat adapter"),
        },
        (Some(_), None) => warn!("Chat gateway configured without a channel id; relay disabled"),
        (None, _) => info!("No chat gateway configured; running with local stdio only"),
    }

    let code = wait_for_exit(exit_listener).await.unwrap_or_else(|| {
        error!("Exit event channel closed without an exit code");
        1
    });
    bridge.finish(settings.drain_timeout()).await;
    let _ = tokio::io::stdout().flush().await;

    info!(code, "Exiting with subprocess exit code");
    std::process::exit(code);
}

/// Command-line values win over the settings file and the environment.
fn apply_cli_overrides(settings: &mut Settings, args: &Args) {
    if let Some(channel_id) = &args.channel_id {
        settings.relay_channel_id = Some(channel_id.clone());
    }
    if let Some(addr) = &args.adapter_addr {
        settings.adapter_addr = Some(addr.clone());
    }
    if let Some(level) = &args.log_level {
        settings.log_level.clone_from(level);
    }
    settings.log_json |= args.log_json;
}
