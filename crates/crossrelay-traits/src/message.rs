//! Inbound message model.
//!
//! Platform adapters convert their native updates into these types; the relay
//! engine never sees platform JSON.

use serde::{Deserialize, Serialize};

pub type ChatId = i64;
pub type MessageId = i64;
pub type ThreadId = i64;
pub type UserId = i64;

/// Canonical "general" thread of a chat.
pub const GENERAL_THREAD: ThreadId = 1;

/// Thread id the platform uses for "no thread".
pub const NO_THREAD_SENTINEL: ThreadId = 0;

/// Map an optional platform thread id onto the canonical thread key.
pub fn normalize_thread(thread: Option<ThreadId>) -> ThreadId {
    match thread {
        None | Some(NO_THREAD_SENTINEL) => GENERAL_THREAD,
        Some(thread) => thread,
    }
}

/// Formatting or semantic annotation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Pre,
    TextLink,
    Url,
    Mention,
    Hashtag,
    BotCommand,
    /// Kinds the relay carries as plain text (spoiler, email, cashtag, ...).
    Other,
}

impl SpanKind {
    /// Machine-readable tokens that must reach the destination verbatim.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Self::Url | Self::Mention | Self::Hashtag | Self::BotCommand
        )
    }

    /// Map a Telegram entity type name.
    pub fn from_platform(name: &str) -> Self {
        match name {
            "bold" => Self::Bold,
            "italic" => Self::Italic,
            "underline" => Self::Underline,
            "strikethrough" => Self::Strikethrough,
            "code" => Self::Code,
            "pre" => Self::Pre,
            "text_link" => Self::TextLink,
            "url" => Self::Url,
            "mention" | "text_mention" => Self::Mention,
            "hashtag" => Self::Hashtag,
            "bot_command" => Self::BotCommand,
            _ => Self::Other,
        }
    }
}

/// A formatting span over a text range.
///
/// `offset` and `length` are measured in UTF-16 code units, the unit the
/// platform reports entities in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingSpan {
    pub offset: usize,
    pub length: usize,
    pub kind: SpanKind,
    /// Target of a `TextLink` span
    pub url: Option<String>,
    /// Language of a `Pre` block
    pub language: Option<String>,
}

impl FormattingSpan {
    pub fn new(kind: SpanKind, offset: usize, length: usize) -> Self {
        Self {
            offset,
            length,
            kind,
            url: None,
            language: None,
        }
    }

    pub fn link(offset: usize, length: usize, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(SpanKind::TextLink, offset, length)
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }
}

/// Text together with its formatting spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    pub text: String,
    pub spans: Vec<FormattingSpan>,
}

impl RichText {
    pub fn new(text: impl Into<String>, spans: Vec<FormattingSpan>) -> Self {
        Self {
            text: text.into(),
            spans,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Media kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Animation,
}

impl MediaKind {
    /// `type` field of a Telegram `InputMedia` object.
    pub fn input_media_type(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Animation => "animation",
        }
    }
}

/// Reference to a platform-hosted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
}

impl MediaRef {
    pub fn new(kind: MediaKind, file_id: impl Into<String>) -> Self {
        Self {
            kind,
            file_id: file_id.into(),
        }
    }
}

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text(RichText),
    Media {
        media: MediaRef,
        caption: Option<RichText>,
    },
    Voice {
        media: MediaRef,
        caption: Option<RichText>,
    },
    /// Stickers, polls, locations and anything else copied verbatim.
    Other,
}

impl MessageKind {
    pub fn caption(&self) -> Option<&RichText> {
        match self {
            Self::Media { caption, .. } | Self::Voice { caption, .. } => caption.as_ref(),
            Self::Text(_) | Self::Other => None,
        }
    }

    pub fn media(&self) -> Option<&MediaRef> {
        match self {
            Self::Media { media, .. } | Self::Voice { media, .. } => Some(media),
            Self::Text(_) | Self::Other => None,
        }
    }
}

/// A message observed in a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub location: ChatId,
    /// Platform thread id, `None` outside threaded chats
    pub thread: Option<ThreadId>,
    /// Sending user, or the sending chat for channel posts
    pub sender_id: Option<UserId>,
    pub kind: MessageKind,
    /// Album (media group) identifier shared by co-posted items
    pub album_id: Option<String>,
    pub reply_to_id: Option<MessageId>,
    /// Edit revision (unix seconds) for edited messages
    pub edit_date: Option<i64>,
}

impl Message {
    pub fn new(id: MessageId, location: ChatId, kind: MessageKind) -> Self {
        Self {
            id,
            location,
            thread: None,
            sender_id: None,
            kind,
            album_id: None,
            reply_to_id: None,
            edit_date: None,
        }
    }

    /// Create a plain text message
    pub fn text(id: MessageId, location: ChatId, text: impl Into<String>) -> Self {
        Self::new(id, location, MessageKind::Text(RichText::plain(text)))
    }

    pub fn with_thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn with_sender(mut self, sender_id: UserId) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    pub fn with_album(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to_id: MessageId) -> Self {
        self.reply_to_id = Some(reply_to_id);
        self
    }

    pub fn with_edit_date(mut self, edit_date: i64) -> Self {
        self.edit_date = Some(edit_date);
        self
    }

    /// Thread key after normalization.
    pub fn thread_key(&self) -> ThreadId {
        normalize_thread(self.thread)
    }
}

/// An event delivered by the inbound feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    New(Message),
    Edited(Message),
}

impl InboundEvent {
    pub fn message(&self) -> &Message {
        match self {
            Self::New(message) | Self::Edited(message) => message,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edited(_))
    }
}
