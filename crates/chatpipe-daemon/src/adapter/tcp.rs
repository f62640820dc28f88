//! NDJSON-over-TCP chat adapter.
//!
//! Talks to a chat gateway process that owns the real chat-service session.
//! Every frame is one JSON object per line, discriminated by `type`:
//!
//! ```text
//! gateway → bridge  {"type":"ready","user_id":"..."}            (first frame)
//! gateway → bridge  {"type":"message","channel_id":"...","author":{...},"content":"..."}
//! bridge → gateway  {"type":"send","channel_id":"...","content":"..."}
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chatpipe_core::{Author, EventChannel};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AdapterError, ChatAdapter, InboundMessage};

/// How long the gateway has to send its `ready` frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// One line of the gateway protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    /// Sent once after connecting; carries the bridge account's user id.
    Ready { user_id: String },
    /// A chat message seen by the gateway.
    Message {
        channel_id: String,
        #[serde(default)]
        message_id: String,
        author: WireAuthor,
        content: String,
    },
    /// A message the bridge wants posted.
    Send { channel_id: String, content: String },
}

/// Author block of a [`WireFrame::Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAuthor {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub accent_color: u32,
}

impl From<WireAuthor> for Author {
    fn from(author: WireAuthor) -> Self {
        Self {
            username: author.username,
            discriminator: author.discriminator,
            accent_color: author.accent_color,
        }
    }
}

/// Adapter connected to a chat gateway over TCP.
pub struct TcpAdapter {
    addr: String,
    self_id: String,
    inbound: EventChannel<InboundMessage>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    /// Set once the gateway side of the connection has ended.
    closed: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
}

impl std::fmt::Debug for TcpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpAdapter")
            .field("addr", &self.addr)
            .field("self_id", &self.self_id)
            .finish_non_exhaustive()
    }
}

impl TcpAdapter {
    /// Connect to `addr` and wait for the gateway's `ready` frame.
    pub async fn connect(addr: &str) -> Result<Self, AdapterError> {
        Self::connect_with_timeout(addr, HANDSHAKE_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        addr: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let handshake_err = |reason: String| AdapterError::Handshake {
            addr: addr.to_string(),
            reason,
        };

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| AdapterError::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let (read_half, write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let first = tokio::time::timeout(handshake_timeout, lines.next_line())
            .await
            .map_err(|_| handshake_err("timed out waiting for ready frame".to_string()))?
            .map_err(|e| handshake_err(e.to_string()))?
            .ok_or_else(|| handshake_err("connection closed before ready frame".to_string()))?;
        let self_id = match serde_json::from_str::<WireFrame>(&first) {
            Ok(WireFrame::Ready { user_id }) => user_id,
            Ok(other) => return Err(handshake_err(format!("expected ready frame, got {other:?}"))),
            Err(e) => return Err(handshake_err(e.to_string())),
        };

        let inbound = EventChannel::with_capacity(16);
        let closed = Arc::new(AtomicBool::new(false));
        let reader_task = spawn_frame_reader(
            addr.to_string(),
            lines,
            inbound.clone(),
            Arc::clone(&closed),
        );
        info!(addr, self_id, "Connected to chat gateway");

        Ok(Self {
            addr: addr.to_string(),
            self_id,
            inbound,
            writer: tokio::sync::Mutex::new(write_half),
            closed,
            reader_task,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the gateway has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for TcpAdapter {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl ChatAdapter for TcpAdapter {
    fn self_id(&self) -> &str {
        &self.self_id
    }

    fn inbound(&self) -> &EventChannel<InboundMessage> {
        &self.inbound
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<(), AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::Closed);
        }
        let mut frame = serde_json::to_string(&WireFrame::Send {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        })
        .map_err(|e| AdapterError::Send(e.to_string()))?;
        frame.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| AdapterError::Send(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| AdapterError::Send(e.to_string()))
    }
}

fn spawn_frame_reader(
    addr: String,
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    inbound: EventChannel<InboundMessage>,
    closed: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!(addr, "Chat gateway closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(addr, error = %e, "Failed to read from chat gateway");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WireFrame>(&line) {
                Ok(WireFrame::Message {
                    channel_id,
                    message_id,
                    author,
                    content,
                }) => {
                    let message = InboundMessage {
                        channel_id,
                        message_id,
                        author_id: author.id.clone(),
                        author: author.into(),
                        content,
                    };
                    inbound.broadcast(message).await;
                }
                Ok(WireFrame::Ready { user_id }) => {
                    debug!(addr, user_id, "Ignoring repeated ready frame");
                }
                Ok(WireFrame::Send { .. }) => {
                    warn!(addr, "Ignoring send frame from gateway");
                }
                Err(e) => {
                    warn!(addr, error = %e, "Ignoring malformed gateway frame");
                }
            }
        }
        closed.store(true, Ordering::Release);
        inbound.close();
    })
}
