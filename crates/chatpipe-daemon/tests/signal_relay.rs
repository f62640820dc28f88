#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)] // Integration tests use unwrap for brevity

//! Signal relay test. Lives in its own binary because it signals the whole
//! test process.

mod common;

use std::time::Duration;

use chatpipe_daemon::subprocess::Subprocess;
use tokio::signal::unix::{SignalKind, signal};

use common::{recv, script};

#[tokio::test]
async fn parent_signals_are_forwarded_to_the_child() {
    // Replace the default (terminating) disposition before anything is sent.
    let _guard = signal(SignalKind::user_defined1()).unwrap();

    let child = script("trap 'echo got-usr1; exit 0' USR1\necho ready\nwhile :; do sleep 1; done");
    let process = Subprocess::from_command(&child.command).unwrap();
    let mut stdout = process.stdout_lines().listen();
    let mut exit = process.exit().listen();

    process.start().unwrap();
    assert_eq!(recv(&mut stdout).await.as_deref(), Some("ready"));
    // Give the relay a moment to install its handlers.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // SAFETY: signalling our own pid; the handler is installed above.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(libc::getpid(), libc::SIGUSR1) };
    assert_eq!(ret, 0);

    assert_eq!(recv(&mut stdout).await.as_deref(), Some("got-usr1"));
    assert_eq!(recv(&mut exit).await, Some(0));
}
