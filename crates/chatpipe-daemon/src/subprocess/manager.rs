//! Child process lifecycle manager.
//!
//! A [`Subprocess`] owns one child process and exposes its streams as event
//! channels:
//!
//! ```text
//! child stdout ──reader──▶ stdout_lines ──▶ listeners
//! child stderr ──reader──▶ stderr_lines ──▶ listeners
//! stdin_lines ──writer──▶ child stdin
//! child exit ──waiter──▶ exit (broadcast once)
//! parent signals ──relay──▶ child (until exit)
//! ```

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chatpipe_core::broadcast::DEFAULT_LISTENER_CAPACITY;
use chatpipe_core::{EventChannel, Listener};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::command::CommandLine;
use super::signals::spawn_signal_relay;

/// Lifecycle of a [`Subprocess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Constructed, not yet spawned.
    Created,
    /// Child spawned and streams wired.
    Running,
    /// Child terminated with the given exit code.
    Exited(i32),
}

/// Configuration for a subprocess.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program and arguments.
    pub command: CommandLine,
    /// Per-listener queue depth for the stream channels.
    pub listener_capacity: usize,
    /// How long the exit waiter lets stdout/stderr drain after the child
    /// terminates before announcing the exit.
    pub drain_timeout: Duration,
}

impl SpawnConfig {
    pub const fn new(command: CommandLine) -> Self {
        Self {
            command,
            listener_capacity: DEFAULT_LISTENER_CAPACITY,
            drain_timeout: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub const fn with_listener_capacity(mut self, capacity: usize) -> Self {
        self.listener_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// One child process wired to event channels.
pub struct Subprocess {
    config: SpawnConfig,
    state: Arc<Mutex<ProcessState>>,
    pid: OnceLock<u32>,
    stdout_lines: EventChannel<String>,
    stderr_lines: EventChannel<String>,
    stdin_lines: EventChannel<String>,
    /// Registered at construction so stdin lines sent before `start` are
    /// held until the child is running.
    stdin_listener: Mutex<Option<Listener<String>>>,
    exit: EventChannel<i32>,
}

impl std::fmt::Debug for Subprocess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subprocess")
            .field("command", &self.config.command)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl Subprocess {
    /// Create a subprocess in the `Created` state. Nothing is spawned yet.
    pub fn new(config: SpawnConfig) -> Self {
        let capacity = config.listener_capacity;
        let stdin_lines = EventChannel::with_capacity(capacity);
        let stdin_listener = Mutex::new(Some(stdin_lines.listen()));
        Self {
            config,
            state: Arc::new(Mutex::new(ProcessState::Created)),
            pid: OnceLock::new(),
            stdout_lines: EventChannel::with_capacity(capacity),
            stderr_lines: EventChannel::with_capacity(capacity),
            stdin_lines,
            stdin_listener,
            exit: EventChannel::with_capacity(capacity),
        }
    }

    /// Parse `command` and create a subprocess with default settings.
    pub fn from_command(command: &str) -> Result<Self, SubprocessError> {
        Ok(Self::new(SpawnConfig::new(CommandLine::parse(command)?)))
    }

    pub const fn command(&self) -> &CommandLine {
        &self.config.command
    }

    /// Lines read from the child's stdout, newline stripped.
    pub const fn stdout_lines(&self) -> &EventChannel<String> {
        &self.stdout_lines
    }

    /// Lines read from the child's stderr, newline stripped.
    pub const fn stderr_lines(&self) -> &EventChannel<String> {
        &self.stderr_lines
    }

    /// Text written verbatim to the child's stdin. Include the newline.
    ///
    /// Lines sent before `start` are held (up to the listener capacity,
    /// then the sender waits) and written once the child runs.
    pub const fn stdin_lines(&self) -> &EventChannel<String> {
        &self.stdin_lines
    }

    /// Fires exactly once with the child's exit code.
    pub const fn exit(&self) -> &EventChannel<i32> {
        &self.exit
    }

    pub fn state(&self) -> ProcessState {
        *lock(&self.state)
    }

    /// OS process id once running.
    pub fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    /// Exit code once the child has exited.
    pub fn exit_code(&self) -> Option<i32> {
        match self.state() {
            ProcessState::Exited(code) => Some(code),
            ProcessState::Created | ProcessState::Running => None,
        }
    }

    /// Send `line` plus a trailing newline to the child's stdin.
    pub async fn write_line(&self, line: &str) -> usize {
        self.stdin_lines.broadcast(format!("{line}\n")).await
    }

    /// Spawn the child and start the background tasks.
    ///
    /// Must be called from within a Tokio runtime. Listeners registered
    /// before this call observe every line the child produces.
    pub fn start(&self) -> Result<(), SubprocessError> {
        let mut state = lock(&self.state);
        if *state != ProcessState::Created {
            return Err(SubprocessError::AlreadyStarted);
        }

        let command = &self.config.command;
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!(command = %command, "Spawning subprocess");
        let mut child = cmd.spawn().map_err(|e| SubprocessError::SpawnFailed {
            program: command.program.clone(),
            reason: e.to_string(),
        })?;

        let Some(stdin) = child.stdin.take() else {
            return Err(abort_spawn(&mut child, "stdin"));
        };
        let Some(stdout) = child.stdout.take() else {
            return Err(abort_spawn(&mut child, "stdout"));
        };
        let Some(stderr) = child.stderr.take() else {
            return Err(abort_spawn(&mut child, "stderr"));
        };

        let stdin_listener = self
            .stdin_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.stdin_lines.listen());
        let writer_exit = self.exit.listen();
        let relay_exit = self.exit.listen();

        let pid = child.id();
        if let Some(pid) = pid {
            let _ = self.pid.set(pid);
        }

        let stdout_task = spawn_line_reader("stdout", stdout, self.stdout_lines.clone());
        let stderr_task = spawn_line_reader("stderr", stderr, self.stderr_lines.clone());
        spawn_stdin_writer(stdin, stdin_listener, writer_exit);
        match pid {
            Some(pid) => {
                spawn_signal_relay(pid, relay_exit);
            }
            None => self.exit.unlisten(relay_exit),
        }
        spawn_exit_waiter(ExitWaiter {
            child,
            readers: [stdout_task, stderr_task],
            drain_timeout: self.config.drain_timeout,
            state: Arc::clone(&self.state),
            stdout_lines: self.stdout_lines.clone(),
            stderr_lines: self.stderr_lines.clone(),
            exit: self.exit.clone(),
        });

        *state = ProcessState::Running;
        drop(state);
        info!(pid = ?pid, "Subprocess started");
        Ok(())
    }
}

fn lock(state: &Mutex<ProcessState>) -> MutexGuard<'_, ProcessState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn abort_spawn(child: &mut Child, stream: &'static str) -> SubprocessError {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to kill subprocess after pipe setup failure");
    }
    SubprocessError::PipeUnavailable { stream }
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily.
pub(crate) fn decode_line(mut raw: &[u8]) -> String {
    if let Some(rest) = raw.strip_suffix(b"\n") {
        raw = rest;
    }
    if let Some(rest) = raw.strip_suffix(b"\r") {
        raw = rest;
    }
    String::from_utf8_lossy(raw).into_owned()
}

fn spawn_line_reader<R>(
    stream: &'static str,
    reader: R,
    lines: EventChannel<String>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    lines.broadcast(decode_line(&buf)).await;
                }
                Err(e) => {
                    warn!(stream, error = %e, "Failed to read from subprocess");
                    break;
                }
            }
        }
        debug!(stream, "Subprocess reader finished");
    })
}

fn spawn_stdin_writer(
    mut stdin: ChildStdin,
    mut lines: Listener<String>,
    mut exit: Listener<i32>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                line = lines.recv() => line,
                _ = exit.recv() => None,
            };
            let Some(line) = line else { break };
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                debug!(error = %e, "Failed to write to subprocess stdin");
                break;
            }
            if let Err(e) = stdin.flush().await {
                debug!(error = %e, "Failed to flush subprocess stdin");
                break;
            }
        }
        debug!("Subprocess stdin writer finished");
    })
}

struct ExitWaiter {
    child: Child,
    readers: [JoinHandle<()>; 2],
    drain_timeout: Duration,
    state: Arc<Mutex<ProcessState>>,
    stdout_lines: EventChannel<String>,
    stderr_lines: EventChannel<String>,
    exit: EventChannel<i32>,
}

fn spawn_exit_waiter(waiter: ExitWaiter) -> JoinHandle<()> {
    let ExitWaiter {
        mut child,
        readers,
        drain_timeout,
        state,
        stdout_lines,
        stderr_lines,
        exit,
    } = waiter;

    tokio::spawn(async move {
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Waiting for subprocess failed");
                std::process::abort();
            }
        };
        let code = exit_code_from_status(status);

        let drain = async {
            for reader in readers {
                let _ = reader.await;
            }
        };
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            warn!(
                timeout_ms = drain_timeout.as_millis(),
                "Subprocess streams still open after exit"
            );
        }
        stdout_lines.close();
        stderr_lines.close();

        *lock(&state) = ProcessState::Exited(code);
        if status.success() {
            info!("Subprocess exited normally");
        } else {
            info!(code, %status, "Subprocess exited abnormally");
        }
        exit.broadcast(code).await;
    })
}

/// Map a child's exit status onto the code the bridge should exit with.
///
/// Normal termination keeps the child's code. On Unix a signal-terminated
/// child maps to `128 + signal`, the shell convention.
pub fn exit_code_from_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Errors from subprocess operations.
#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Subprocess already started")]
    AlreadyStarted,

    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Failed to capture subprocess {stream} pipe")]
    PipeUnavailable { stream: &'static str },
}
