//! Filtering and translation policy for both relay directions.

use chatpipe_core::RuleSet;

use crate::adapter::InboundMessage;

/// Translate a subprocess line for the chat. `None` means drop it.
pub fn translate_outbound(rules: &RuleSet, line: &str) -> Option<String> {
    let message = rules.outbound(line);
    (!message.is_empty()).then_some(message)
}

/// Translate a chat message into a stdin line (newline included).
///
/// `None` for the adapter's own messages, messages from other channels, and
/// messages no rule matched.
pub fn translate_inbound(
    rules: &RuleSet,
    relay_channel_id: &str,
    self_id: &str,
    message: &InboundMessage,
) -> Option<String> {
    if message.author_id == self_id || message.channel_id != relay_channel_id {
        return None;
    }
    let line = rules.inbound(&message.props(), &message.content);
    if line.is_empty() {
        return None;
    }
    Some(line + "\n")
}
