//! In-process chat adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chatpipe_core::EventChannel;

use super::{AdapterError, ChatAdapter, InboundMessage};

/// A message handed to [`MemoryAdapter::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: String,
    pub content: String,
}

/// Adapter that keeps everything in memory: inbound messages are injected by
/// the caller, outbound messages are recorded and rebroadcast.
#[derive(Debug)]
pub struct MemoryAdapter {
    self_id: String,
    inbound: EventChannel<InboundMessage>,
    outbound: EventChannel<SentMessage>,
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
}

impl MemoryAdapter {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            inbound: EventChannel::with_capacity(16),
            outbound: EventChannel::with_capacity(16),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Publish `message` as if it arrived from the chat.
    pub async fn inject(&self, message: InboundMessage) -> usize {
        self.inbound.broadcast(message).await
    }

    /// Every successfully sent message so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Successfully sent messages, as they happen.
    pub const fn outbound(&self) -> &EventChannel<SentMessage> {
        &self.outbound
    }

    /// Make subsequent sends fail, simulating an unreachable service.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }
}

impl ChatAdapter for MemoryAdapter {
    fn self_id(&self) -> &str {
        &self.self_id
    }

    fn inbound(&self) -> &EventChannel<InboundMessage> {
        &self.inbound
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<(), AdapterError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(AdapterError::Send("memory adapter set to fail".to_string()));
        }
        let message = SentMessage {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        };
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        self.outbound.broadcast(message).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use chatpipe_core::Author;

    #[tokio::test]
    async fn records_sent_messages() {
        let adapter = MemoryAdapter::new("bot");
        adapter.send("general", "one").await.unwrap();
        adapter.send("general", "two").await.unwrap();

        let sent = adapter.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, "two");
    }

    #[tokio::test]
    async fn failing_sends_are_not_recorded() {
        let adapter = MemoryAdapter::new("bot");
        adapter.set_fail_sends(true);
        assert!(matches!(
            adapter.send("general", "lost").await,
            Err(AdapterError::Send(_))
        ));
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn injected_messages_reach_listeners() {
        let adapter = MemoryAdapter::new("bot");
        let mut listener = adapter.inbound().listen();
        let message = InboundMessage {
            channel_id: "general".to_string(),
            message_id: "m1".to_string(),
            author_id: "u1".to_string(),
            author: Author::default(),
            content: "hi".to_string(),
        };

        assert_eq!(adapter.inject(message.clone()).await, 1);
        assert_eq!(listener.recv().await, Some(message));
    }
}
