#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)] // Integration tests use unwrap for brevity

//! Runs the `chatpipe` binary as a top-level process.

mod common;

use std::process::Stdio;

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use common::{TIMEOUT, script};

/// Empty rules and settings, isolated from the user's configuration.
fn workdir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("rules.json"), "{}").unwrap();
    std::fs::write(dir.path().join("settings.json"), "{}").unwrap();
    dir
}

fn chatpipe(dir: &TempDir, command: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chatpipe"));
    cmd.arg("--config")
        .arg(dir.path().join("settings.json"))
        .arg("--rules")
        .arg(dir.path().join("rules.json"))
        .arg(command)
        .env_remove("CHATPIPE_CHANNEL_ID")
        .env_remove("CHATPIPE_ADAPTER_ADDR")
        .env_remove("CHATPIPE_LOG_LEVEL")
        .env_remove("CHATPIPE_LISTENER_CAPACITY")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[tokio::test]
async fn exits_with_the_child_exit_code() {
    let dir = workdir();
    let child = script("echo hello\nexit 3");

    let output = tokio::time::timeout(
        TIMEOUT,
        chatpipe(&dir, &child.command).stdin(Stdio::null()).output(),
    )
    .await
    .expect("chatpipe did not exit")
    .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
}

#[tokio::test]
async fn signal_terminated_child_maps_to_128_plus_signal() {
    let dir = workdir();
    let child = script("kill -TERM $$");

    let output = tokio::time::timeout(
        TIMEOUT,
        chatpipe(&dir, &child.command).stdin(Stdio::null()).output(),
    )
    .await
    .expect("chatpipe did not exit")
    .unwrap();

    assert_eq!(output.status.code(), Some(143));
}

#[tokio::test]
async fn parent_stdin_reaches_the_child() {
    let dir = workdir();
    let child = script("read line\necho \"got $line\"\nexit 4");

    let mut process = chatpipe(&dir, &child.command)
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    let mut stdin = process.stdin.take().unwrap();
    stdin.write_all(b"ping\n").await.unwrap();

    let output = tokio::time::timeout(TIMEOUT, process.wait_with_output())
        .await
        .expect("chatpipe did not exit")
        .unwrap();
    drop(stdin);

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "got ping\n");
}

#[tokio::test]
async fn failed_start_exits_while_stdin_is_open() {
    let dir = workdir();

    let mut process = chatpipe(&dir, "/nonexistent/chatpipe-missing-binary")
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    // Held open for the whole run: nothing ever arrives on it.
    let stdin = process.stdin.take().unwrap();

    let output = tokio::time::timeout(TIMEOUT, process.wait_with_output())
        .await
        .expect("chatpipe kept running after a failed start")
        .unwrap();
    drop(stdin);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error starting command"));
}

#[tokio::test]
async fn missing_rules_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{}").unwrap();

    let output = tokio::time::timeout(
        TIMEOUT,
        chatpipe(&dir, "true").stdin(Stdio::null()).output(),
    )
    .await
    .expect("chatpipe did not exit")
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rules.json"));
}
