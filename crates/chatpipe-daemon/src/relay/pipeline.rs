//! Bridge pipeline: subprocess ↔ chat and subprocess ↔ local stdio.
//!
//! Data flow:
//! ```text
//! subprocess stdout/stderr → outbound rules → ChatAdapter::send
//! ChatAdapter inbound → filter → inbound rules → subprocess stdin
//! subprocess stdout/stderr → parent stdout/stderr
//! parent stdin → subprocess stdin
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chatpipe_core::{EventChannel, Listener, RuleSet};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::adapter::ChatAdapter;
use crate::subprocess::Subprocess;
use crate::subprocess::manager::decode_line;

use super::translate::{translate_inbound, translate_outbound};

/// Wires one subprocess to the rules, a chat adapter and local stdio.
pub struct Bridge {
    subprocess: Arc<Subprocess>,
    rules: Arc<RuleSet>,
    relay_channel_id: String,
    /// Tasks that finish once the subprocess output channels close.
    stream_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("subprocess", &self.subprocess)
            .field("relay_channel_id", &self.relay_channel_id)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    pub fn new(
        subprocess: Arc<Subprocess>,
        rules: RuleSet,
        relay_channel_id: impl Into<String>,
    ) -> Self {
        Self {
            subprocess,
            rules: Arc::new(rules),
            relay_channel_id: relay_channel_id.into(),
            stream_tasks: Mutex::new(Vec::new()),
        }
    }

    pub const fn subprocess(&self) -> &Arc<Subprocess> {
        &self.subprocess
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Mirror child output onto the parent's stdout/stderr. Call before
    /// `Subprocess::start` so the first lines are not missed.
    pub fn mirror_local_output(&self) {
        self.mirror_output(tokio::io::stdout(), tokio::io::stderr());
    }

    /// Forward the parent's stdin lines to the child.
    ///
    /// Call only once the child is running: the pending stdin read occupies
    /// a blocking thread that runtime shutdown waits for.
    pub fn forward_local_input(&self) -> JoinHandle<()> {
        self.forward_input(tokio::io::stdin())
    }

    /// Write every stdout/stderr line, newline re-appended, to `stdout` and
    /// `stderr` respectively.
    pub fn mirror_output<O, E>(&self, stdout: O, stderr: E)
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let out = spawn_mirror("stdout", self.subprocess.stdout_lines().listen(), stdout);
        let err = spawn_mirror("stderr", self.subprocess.stderr_lines().listen(), stderr);
        self.track([out, err]);
    }

    /// Forward each line read from `reader` to the child's stdin.
    pub fn forward_input<R>(&self, reader: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        spawn_input_forwarder(reader, self.subprocess.stdin_lines().clone())
    }

    /// Relay translated output to `adapter` and translated chat messages
    /// from the relay channel to the child.
    pub fn attach<A: ChatAdapter>(&self, adapter: Arc<A>) {
        let stdout = spawn_outbound(OutboundRelay {
            stream: "stdout",
            lines: self.subprocess.stdout_lines().listen(),
            rules: Arc::clone(&self.rules),
            adapter: Arc::clone(&adapter),
            channel_id: self.relay_channel_id.clone(),
        });
        let stderr = spawn_outbound(OutboundRelay {
            stream: "stderr",
            lines: self.subprocess.stderr_lines().listen(),
            rules: Arc::clone(&self.rules),
            adapter: Arc::clone(&adapter),
            channel_id: self.relay_channel_id.clone(),
        });
        self.track([stdout, stderr]);

        spawn_inbound(InboundRelay {
            messages: adapter.inbound().listen(),
            adapter,
            rules: Arc::clone(&self.rules),
            channel_id: self.relay_channel_id.clone(),
            stdin_lines: self.subprocess.stdin_lines().clone(),
        });
        info!(channel_id = %self.relay_channel_id, "Chat relay attached");
    }

    /// Wait, at most `timeout`, for mirrors and outbound relays to flush the
    /// last lines after the subprocess streams have closed.
    pub async fn finish(&self, timeout: Duration) {
        let tasks = std::mem::take(
            &mut *self
                .stream_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let join_all = async {
            for task in tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!("Relay tasks still busy at shutdown");
        }
    }

    fn track(&self, tasks: impl IntoIterator<Item = JoinHandle<()>>) {
        self.stream_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tasks);
    }
}

/// Wait for the exit event. `None` if the channel closed without one.
pub async fn wait_for_exit(mut exit: Listener<i32>) -> Option<i32> {
    debug!("Waiting for subprocess to exit");
    exit.recv().await
}

fn spawn_mirror<W>(stream: &'static str, mut lines: Listener<String>, mut out: W) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(mut line) = lines.recv().await {
            line.push('\n');
            if let Err(e) = out.write_all(line.as_bytes()).await {
                warn!(stream, error = %e, "Failed to mirror subprocess output");
                break;
            }
            let _ = out.flush().await;
        }
        trace!(stream, "Mirror finished");
    })
}

fn spawn_input_forwarder<R>(reader: R, stdin_lines: EventChannel<String>) -> JoinHandle<()>
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
                    let mut line = decode_line(&buf);
                    line.push('\n');
                    stdin_lines.broadcast(line).await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read local stdin");
                    break;
                }
            }
        }
        debug!("Local stdin forwarder finished");
    })
}

struct OutboundRelay<A> {
    stream: &'static str,
    lines: Listener<String>,
    rules: Arc<RuleSet>,
    adapter: Arc<A>,
    channel_id: String,
}

fn spawn_outbound<A: ChatAdapter>(relay: OutboundRelay<A>) -> JoinHandle<()> {
    let OutboundRelay {
        stream,
        mut lines,
        rules,
        adapter,
        channel_id,
    } = relay;

    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            let Some(message) = translate_outbound(&rules, &line) else {
                trace!(stream, "No outbound rule matched");
                continue;
            };
            if let Err(e) = adapter.send(&channel_id, &message).await {
                warn!(stream, error = %e, "Failed to send message to chat");
            }
        }
        debug!(stream, "Outbound relay finished");
    })
}

struct InboundRelay<A> {
    messages: Listener<crate::adapter::InboundMessage>,
    adapter: Arc<A>,
    rules: Arc<RuleSet>,
    channel_id: String,
    stdin_lines: EventChannel<String>,
}

fn spawn_inbound<A: ChatAdapter>(relay: InboundRelay<A>) -> JoinHandle<()> {
    let InboundRelay {
        mut messages,
        adapter,
        rules,
        channel_id,
        stdin_lines,
    } = relay;

    tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            let Some(line) = translate_inbound(&rules, &channel_id, adapter.self_id(), &message)
            else {
                trace!(channel_id = %message.channel_id, "Inbound message dropped");
                continue;
            };
            debug!(author = %message.author.username, "Relaying chat message to subprocess");
            stdin_lines.broadcast(line).await;
        }
        debug!("Inbound relay finished");
    })
}
