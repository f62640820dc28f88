//! Shared helpers for daemon integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use chatpipe_core::Listener;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A shell script in a temp dir, plus the command line that runs it.
pub struct Script {
    _dir: tempfile::TempDir,
    pub command: String,
}

pub fn script(body: &str) -> Script {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("child.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    Script {
        command: format!("sh {}", path.display()),
        _dir: dir,
    }
}

/// Receive one item or fail the test after [`TIMEOUT`].
pub async fn recv<T>(listener: &mut Listener<T>) -> Option<T> {
    tokio::time::timeout(TIMEOUT, listener.recv())
        .await
        .expect("timed out waiting for event")
}

/// Collect items until the channel closes.
pub async fn collect<T>(listener: &mut Listener<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Some(item) = recv(listener).await {
        items.push(item);
    }
    items
}
