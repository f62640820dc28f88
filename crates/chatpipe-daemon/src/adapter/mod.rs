//! Chat adapters: the remote side of the bridge.
//!
//! An adapter sends plain-text lines to a chat channel and publishes every
//! message it receives on an [`EventChannel`], tagged with its channel and
//! author so the bridge can filter and translate it.

mod memory;
mod tcp;

use std::future::Future;

use chatpipe_core::{Author, EventChannel, Props};
use serde::{Deserialize, Serialize};

pub use memory::{MemoryAdapter, SentMessage};
pub use tcp::{TcpAdapter, WireFrame};

/// A message received from the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel the message was posted in.
    pub channel_id: String,
    #[serde(default)]
    pub message_id: String,
    /// Sender identity, compared against [`ChatAdapter::self_id`].
    pub author_id: String,
    pub author: Author,
    pub content: String,
}

impl InboundMessage {
    /// Template context for this message's author.
    pub fn props(&self) -> Props {
        Props::new(self.author.clone())
    }
}

/// Remote chat service as seen by the bridge.
pub trait ChatAdapter: Send + Sync + 'static {
    /// Identity of the adapter's own account; its echoes are not relayed.
    fn self_id(&self) -> &str;

    /// Messages received from the chat.
    fn inbound(&self) -> &EventChannel<InboundMessage>;

    /// Post `content` to `channel_id`.
    fn send(
        &self,
        channel_id: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;
}

/// Errors from chat adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("Handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Adapter connection closed")]
    Closed,
}
