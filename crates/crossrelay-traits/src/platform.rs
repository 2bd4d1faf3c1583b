//! Outbound platform interface.
//!
//! Every method is a single platform call. Retrying, backoff and alerting are
//! the caller's concern; implementations only classify failures into
//! [`DeliveryError`] variants.

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::message::{ChatId, GENERAL_THREAD, MediaRef, MessageId, ThreadId};

/// Destination location with a normalized thread key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    pub chat: ChatId,
    pub thread: ThreadId,
}

impl Destination {
    pub fn new(chat: ChatId, thread: ThreadId) -> Self {
        Self { chat, thread }
    }

    /// Thread id to put on the wire; the general thread is addressed by omission.
    pub fn platform_thread(&self) -> Option<ThreadId> {
        (self.thread != GENERAL_THREAD).then_some(self.thread)
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chat, self.thread)
    }
}

/// A rendered text post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundText {
    pub dest: Destination,
    /// HTML-formatted body
    pub html: String,
    pub reply_to: Option<MessageId>,
}

/// Copy of an existing message, optionally with a replaced caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCopy {
    pub dest: Destination,
    pub from_chat: ChatId,
    pub message_id: MessageId,
    /// HTML caption override; `None` keeps the original caption
    pub caption_html: Option<String>,
    pub reply_to: Option<MessageId>,
}

/// One item of a batched media post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMediaItem {
    pub media: MediaRef,
    pub caption_html: Option<String>,
}

/// A batched media post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAlbum {
    pub dest: Destination,
    pub items: Vec<OutboundMediaItem>,
    pub reply_to: Option<MessageId>,
}

/// Outbound calls the relay engine makes against the chat platform.
#[async_trait]
pub trait RelayPlatform: Send + Sync {
    /// Platform display name for logs
    fn name(&self) -> &str;

    /// Send a text post, returning the new message id.
    async fn send_text(&self, message: &OutboundText) -> Result<MessageId, DeliveryError>;

    /// Send a batched media post, returning one id per item in item order.
    async fn send_album(&self, album: &OutboundAlbum) -> Result<Vec<MessageId>, DeliveryError>;

    /// Copy a message, returning the id of the copy.
    async fn copy_message(&self, copy: &OutboundCopy) -> Result<MessageId, DeliveryError>;

    async fn edit_text(
        &self,
        chat: ChatId,
        message_id: MessageId,
        html: &str,
    ) -> Result<(), DeliveryError>;

    async fn edit_caption(
        &self,
        chat: ChatId,
        message_id: MessageId,
        html: &str,
    ) -> Result<(), DeliveryError>;

    /// Fetch the bytes of a platform-hosted file.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_thread_omits_general() {
        assert_eq!(Destination::new(-100, GENERAL_THREAD).platform_thread(), None);
        assert_eq!(Destination::new(-100, 10).platform_thread(), Some(10));
    }

    #[test]
    fn test_destination_display() {
        assert_eq!(Destination::new(-100, 10).to_string(), "-100:10");
    }
}
