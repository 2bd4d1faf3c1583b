//! Operator alerting.

use async_trait::async_trait;

use crate::message::{ChatId, MessageId};
use crate::platform::Destination;

/// A permanent, unrecoverable delivery failure worth a human's attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub source_chat: ChatId,
    pub source_message_id: MessageId,
    pub dest: Destination,
    /// Outbound operation that failed (`send_text`, `send_album`, ...)
    pub operation: String,
    pub error: String,
}

impl Alert {
    /// Human-readable one-paragraph summary.
    pub fn summary(&self) -> String {
        format!(
            "Relay failure: {} of message {} from chat {} to {} failed: {}",
            self.operation, self.source_message_id, self.source_chat, self.dest, self.error
        )
    }
}

/// Fire-and-forget operator channel.
///
/// Implementations log their own failures; alerting never fails the relay.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert);
}
