//! Bot API wire types and their mapping onto relay messages.

use serde::Deserialize;

use crossrelay_traits::{
    FormattingSpan, InboundEvent, MediaKind, MediaRef, Message, MessageKind, RichText, SpanKind,
};

#[derive(Debug, Deserialize)]
pub(super) struct TelegramResponse<T> {
    pub(super) ok: bool,
    pub(super) result: Option<T>,
    pub(super) description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramUpdate {
    pub(super) update_id: i64,
    pub(super) message: Option<TelegramMessage>,
    pub(super) edited_message: Option<TelegramMessage>,
    pub(super) channel_post: Option<TelegramMessage>,
    pub(super) edited_channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramMessage {
    pub(super) message_id: i64,
    pub(super) from: Option<TelegramUser>,
    pub(super) sender_chat: Option<TelegramChat>,
    pub(super) chat: TelegramChat,
    pub(super) message_thread_id: Option<i64>,
    pub(super) is_topic_message: Option<bool>,
    pub(super) media_group_id: Option<String>,
    pub(super) edit_date: Option<i64>,
    pub(super) text: Option<String>,
    pub(super) entities: Option<Vec<TelegramEntity>>,
    pub(super) caption: Option<String>,
    pub(super) caption_entities: Option<Vec<TelegramEntity>>,
    pub(super) photo: Option<Vec<TelegramPhotoSize>>,
    pub(super) video: Option<TelegramFileRef>,
    pub(super) animation: Option<TelegramFileRef>,
    pub(super) document: Option<TelegramFileRef>,
    pub(super) audio: Option<TelegramFileRef>,
    pub(super) voice: Option<TelegramFileRef>,
    pub(super) reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramUser {
    pub(super) id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramChat {
    pub(super) id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramEntity {
    #[serde(rename = "type")]
    pub(super) kind: String,
    pub(super) offset: usize,
    pub(super) length: usize,
    pub(super) url: Option<String>,
    pub(super) language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramPhotoSize {
    pub(super) file_id: String,
    pub(super) file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramFileRef {
    pub(super) file_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramFile {
    pub(super) file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TelegramMessageRef {
    pub(super) message_id: i64,
}

impl TelegramUpdate {
    pub(super) fn into_event(self) -> Option<InboundEvent> {
        if let Some(message) = self.message.or(self.channel_post) {
            return Some(InboundEvent::New(message.into_message()));
        }
        self.edited_message
            .or(self.edited_channel_post)
            .map(|message| InboundEvent::Edited(message.into_message()))
    }
}

impl TelegramEntity {
    fn into_span(self) -> FormattingSpan {
        let kind = SpanKind::from_platform(&self.kind);
        let mut span = FormattingSpan::new(kind, self.offset, self.length);
        span.url = self.url;
        span.language = self.language;
        span
    }
}

fn rich_text(text: String, entities: Option<Vec<TelegramEntity>>) -> RichText {
    let spans = entities
        .unwrap_or_default()
        .into_iter()
        .map(TelegramEntity::into_span)
        .collect();
    RichText::new(text, spans)
}

impl TelegramMessage {
    /// Thread id, only for genuine forum topic posts.
    fn topic_thread(&self) -> Option<i64> {
        self.message_thread_id
            .filter(|_| self.is_topic_message == Some(true))
    }

    fn media(&mut self) -> Option<MediaRef> {
        if let Some(photos) = self.photo.take() {
            // Sizes are listed smallest first; prefer the reported file size.
            let best = photos
                .into_iter()
                .enumerate()
                .max_by_key(|(index, photo)| (photo.file_size.unwrap_or(0), *index))?;
            return Some(MediaRef::new(MediaKind::Photo, best.1.file_id));
        }
        if let Some(video) = self.video.take() {
            return Some(MediaRef::new(MediaKind::Video, video.file_id));
        }
        // Animations also carry a `document` field.
        if let Some(animation) = self.animation.take() {
            self.document = None;
            return Some(MediaRef::new(MediaKind::Animation, animation.file_id));
        }
        if let Some(document) = self.document.take() {
            return Some(MediaRef::new(MediaKind::Document, document.file_id));
        }
        self.audio
            .take()
            .map(|audio| MediaRef::new(MediaKind::Audio, audio.file_id))
    }

    pub(super) fn into_message(mut self) -> Message {
        let thread = self.topic_thread();
        let sender_id = self
            .from
            .as_ref()
            .map(|user| user.id)
            .or_else(|| self.sender_chat.as_ref().map(|chat| chat.id));

        // Inside a topic, a message that replies to nothing still points at
        // the topic's opening message.
        let reply_to_id = self
            .reply_to_message
            .as_ref()
            .map(|reply| reply.message_id)
            .filter(|reply_id| thread != Some(*reply_id));

        let caption = self
            .caption
            .take()
            .map(|caption| rich_text(caption, self.caption_entities.take()));

        let kind = if let Some(text) = self.text.take() {
            MessageKind::Text(rich_text(text, self.entities.take()))
        } else if let Some(voice) = self.voice.take() {
            MessageKind::Voice {
                media: MediaRef::new(MediaKind::Audio, voice.file_id),
                caption,
            }
        } else if let Some(media) = self.media() {
            MessageKind::Media { media, caption }
        } else {
            MessageKind::Other
        };

        Message {
            id: self.message_id,
            location: self.chat.id,
            thread,
            sender_id,
            kind,
            album_id: self.media_group_id,
            reply_to_id,
            edit_date: self.edit_date,
        }
    }
}
