//! CrossRelay Traits - Shared message model and collaborator interfaces.
//!
//! This crate provides the types shared across the CrossRelay workspace:
//! - Inbound message model (`Message`, `MessageKind`, `RichText`, `FormattingSpan`)
//! - Outbound platform calls (`RelayPlatform` and its request types)
//! - Translation and transcription providers (`Translator`, `Transcriber`)
//! - Operator alerting (`OperatorNotifier`)
//! - Typed errors for delivery and provider failures

pub mod error;
pub mod message;
pub mod notify;
pub mod platform;
pub mod provider;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use error::{DeliveryError, ProviderError};

pub use message::{
    ChatId, FormattingSpan, GENERAL_THREAD, InboundEvent, MediaKind, MediaRef, Message,
    MessageId, MessageKind, NO_THREAD_SENTINEL, RichText, SpanKind, ThreadId, UserId,
    normalize_thread,
};

pub use notify::{Alert, OperatorNotifier};

pub use platform::{
    Destination, OutboundAlbum, OutboundCopy, OutboundMediaItem, OutboundText, RelayPlatform,
};

pub use provider::{Transcriber, Translator};
