//! Relay of the parent's signals to the child until it exits.

use chatpipe_core::Listener;
use tokio::task::JoinHandle;
use tracing::debug;

/// Signals forwarded to the child. `SIGKILL` and `SIGSTOP` cannot be caught,
/// and `SIGCHLD` concerns the parent only. Job-control and process-local
/// signals (`SIGTSTP`, `SIGCONT`, `SIGTTIN`, `SIGTTOU`, `SIGALRM`, `SIGPIPE`)
/// are not relayed: the terminal already delivers job control to the whole
/// foreground group and the others describe the parent's own state.
#[cfg(unix)]
const RELAYED_SIGNALS: &[libc::c_int] = &[
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTERM,
    libc::SIGUSR1,
    libc::SIGUSR2,
    libc::SIGWINCH,
];

/// Forward every relayed signal to `pid` until the exit event fires.
#[cfg(unix)]
pub(super) fn spawn_signal_relay(pid: u32, mut exit: Listener<i32>) -> JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::warn;

    tokio::spawn(async move {
        let mut forwarders = Vec::with_capacity(RELAYED_SIGNALS.len());
        for &signo in RELAYED_SIGNALS {
            match signal(SignalKind::from_raw(signo)) {
                Ok(mut stream) => forwarders.push(tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        forward_signal(pid, signo);
                    }
                })),
                Err(e) => warn!(signal = signo, error = %e, "Cannot listen for signal"),
            }
        }

        let _ = exit.recv().await;
        for forwarder in forwarders {
            forwarder.abort();
        }
        debug!("Signal relay stopped");
    })
}

#[cfg(unix)]
fn forward_signal(pid: u32, signo: libc::c_int) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; pid comes from our
    // own child handle.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(pid, signo) };
    if ret == 0 {
        debug!(pid, signal = signo, "Relayed signal to subprocess");
    } else {
        let err = std::io::Error::last_os_error();
        debug!(pid, signal = signo, error = %err, "Couldn't send signal to subprocess");
    }
}

/// Signals are not relayed on this platform; wait for the exit event only.
#[cfg(not(unix))]
pub(super) fn spawn_signal_relay(_pid: u32, mut exit: Listener<i32>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = exit.recv().await;
        debug!("Signal relay stopped");
    })
}
