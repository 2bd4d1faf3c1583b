//! Per-edge delivery: render, send, record links and alert on permanent failure.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crossrelay_traits::{
    Alert, ChatId, DeliveryError, Destination, Message, MessageId, MessageKind, OperatorNotifier,
    OutboundAlbum, OutboundCopy, OutboundMediaItem, OutboundText, RelayPlatform, RichText,
    Transcriber,
};

use super::album::{AlbumKey, AlbumSink};
use crate::delivery::DeliveryExecutor;
use crate::links::ReplyLinkStore;
use crate::routing::ResolvedRoute;
use crate::translate::{EntityTranslator, escape_html_text};

/// Platform limit for one batched media post.
pub const MAX_ALBUM_ITEMS: usize = 10;

/// Shared collaborators used by every delivery task.
pub struct RelayContext {
    pub platform: Arc<dyn RelayPlatform>,
    pub translator: EntityTranslator,
    pub links: ReplyLinkStore,
    pub executor: DeliveryExecutor,
    pub notifier: Arc<dyn OperatorNotifier>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub language_hint: Option<String>,
}

impl RelayContext {
    /// Relay a new, non-album message along one edge.
    pub async fn deliver_new(&self, message: &Message, route: ResolvedRoute) {
        let dest = route.dest;
        let reply_to = self.mapped_reply(message, dest.chat);

        match &message.kind {
            MessageKind::Text(rich) => {
                if rich.is_blank() {
                    debug!(
                        source_chat = message.location,
                        message_id = message.id,
                        "Skipping blank text message"
                    );
                    return;
                }
                let html = self.translator.translate_rich(rich, route.translate).await;
                let outbound = OutboundText {
                    dest,
                    html,
                    reply_to,
                };
                let result = self
                    .executor
                    .run("send_text", dest, || self.platform.send_text(&outbound))
                    .await;
                self.record(message, dest, "send_text", result);
            }
            MessageKind::Media { caption, .. } => {
                let caption_html = self.caption_html(caption.as_ref(), route.translate).await;
                self.copy(message, dest, caption_html, reply_to).await;
            }
            MessageKind::Voice { media, caption } => {
                let caption_html = self.caption_html(caption.as_ref(), route.translate).await;
                let Some(copied) = self.copy(message, dest, caption_html, reply_to).await else {
                    return;
                };
                if route.translate {
                    self.send_transcript(message, &media.file_id, dest, copied)
                        .await;
                }
            }
            MessageKind::Other => {
                self.copy(message, dest, None, reply_to).await;
            }
        }
    }

    /// Apply an edit to the relayed counterpart on one edge.
    pub async fn deliver_edit(&self, message: &Message, route: ResolvedRoute) {
        let dest = route.dest;
        let Some(dest_message_id) = self.links.lookup(message.location, message.id, dest.chat)
        else {
            debug!(
                source_chat = message.location,
                message_id = message.id,
                dest = %dest,
                "No relayed counterpart for edit, dropping"
            );
            return;
        };

        let (operation, html) = match &message.kind {
            MessageKind::Text(rich) => (
                "edit_text",
                self.translator.translate_rich(rich, route.translate).await,
            ),
            MessageKind::Media {
                caption: Some(caption),
                ..
            }
            | MessageKind::Voice {
                caption: Some(caption),
                ..
            } => (
                "edit_caption",
                self.translator.translate_rich(caption, route.translate).await,
            ),
            _ => {
                debug!(
                    source_chat = message.location,
                    message_id = message.id,
                    "Edit carries nothing to update"
                );
                return;
            }
        };

        let result = if operation == "edit_text" {
            self.executor
                .run(operation, dest, || {
                    self.platform.edit_text(dest.chat, dest_message_id, &html)
                })
                .await
        } else {
            // Album captions live on the first relayed item, not on this item's copy.
            let target = self
                .links
                .caption_target(message.location, message.id, dest.chat)
                .unwrap_or(dest_message_id);
            self.executor
                .run(operation, dest, || {
                    self.platform.edit_caption(dest.chat, target, &html)
                })
                .await
        };

        match result {
            Ok(()) => debug!(
                source_chat = message.location,
                message_id = message.id,
                dest = %dest,
                dest_message_id,
                "Edit relayed"
            ),
            Err(e) => self.report(message.location, message.id, dest, operation, e),
        }
    }

    async fn caption_html(&self, caption: Option<&RichText>, translate: bool) -> Option<String> {
        // Untranslated captions stay untouched by omitting the override.
        let caption = caption.filter(|caption| translate && !caption.is_blank())?;
        Some(self.translator.translate_rich(caption, true).await)
    }

    async fn copy(
        &self,
        message: &Message,
        dest: Destination,
        caption_html: Option<String>,
        reply_to: Option<MessageId>,
    ) -> Option<MessageId> {
        let outbound = OutboundCopy {
            dest,
            from_chat: message.location,
            message_id: message.id,
            caption_html,
            reply_to,
        };
        let result = self
            .executor
            .run("copy_message", dest, || self.platform.copy_message(&outbound))
            .await;
        self.record(message, dest, "copy_message", result)
    }

    async fn send_transcript(
        &self,
        message: &Message,
        file_id: &str,
        dest: Destination,
        reply_to: MessageId,
    ) {
        let Some(transcriber) = &self.transcriber else {
            return;
        };

        let audio = match self
            .executor
            .run("download_file", dest, || self.platform.download_file(file_id))
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                warn!(
                    source_chat = message.location,
                    message_id = message.id,
                    error = %e,
                    "Voice download failed, skipping transcript"
                );
                return;
            }
        };

        let transcript = match transcriber
            .transcribe(audio, self.language_hint.as_deref())
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return,
            Err(e) => {
                warn!(
                    source_chat = message.location,
                    message_id = message.id,
                    provider = transcriber.provider_name(),
                    error = %e,
                    "Transcription failed, skipping transcript"
                );
                return;
            }
        };

        let translated = self.translator.translate_plain(&transcript).await;
        let outbound = OutboundText {
            dest,
            html: escape_html_text(&translated),
            reply_to: Some(reply_to),
        };
        if let Err(e) = self
            .executor
            .run("send_transcript", dest, || self.platform.send_text(&outbound))
            .await
        {
            self.report(message.location, message.id, dest, "send_transcript", e);
        }
    }

    fn mapped_reply(&self, message: &Message, dest_chat: ChatId) -> Option<MessageId> {
        let reply_to = message.reply_to_id?;
        let mapped = self.links.lookup(message.location, reply_to, dest_chat);
        if mapped.is_none() {
            debug!(
                source_chat = message.location,
                reply_to,
                dest_chat,
                "Reply target not relayed, sending without reply link"
            );
        }
        mapped
    }

    fn record(
        &self,
        message: &Message,
        dest: Destination,
        operation: &str,
        result: Result<MessageId, DeliveryError>,
    ) -> Option<MessageId> {
        match result {
            Ok(dest_message_id) => {
                self.links
                    .save(message.location, message.id, dest.chat, dest_message_id);
                debug!(
                    source_chat = message.location,
                    message_id = message.id,
                    dest = %dest,
                    dest_message_id,
                    operation,
                    "Relayed"
                );
                Some(dest_message_id)
            }
            Err(e) => {
                self.report(message.location, message.id, dest, operation, e);
                None
            }
        }
    }

    /// Log a dropped edge; permanent failures also alert the operator.
    ///
    /// The alert is sent on its own task so a slow operator channel never
    /// holds up delivery.
    pub fn report(
        &self,
        source_chat: ChatId,
        source_message_id: MessageId,
        dest: Destination,
        operation: &str,
        err: DeliveryError,
    ) {
        if !err.is_permanent() {
            error!(
                source_chat,
                message_id = source_message_id,
                dest = %dest,
                operation,
                error = %err,
                "Delivery abandoned"
            );
            return;
        }

        error!(
            source_chat,
            message_id = source_message_id,
            dest = %dest,
            operation,
            error = %err,
            "Permanent delivery failure, edge dropped"
        );
        let alert = Alert {
            source_chat,
            source_message_id,
            dest,
            operation: operation.to_string(),
            error: err.to_string(),
        };
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            notifier.notify(&alert).await;
        });
    }
}

#[async_trait]
impl AlbumSink for RelayContext {
    async fn flush_album(&self, key: &AlbumKey, mut items: Vec<Message>) {
        items.sort_by_key(|item| item.id);

        let media: Vec<(MessageId, OutboundMediaItem)> = items
            .iter()
            .filter_map(|item| {
                item.kind.media().map(|media| {
                    (
                        item.id,
                        OutboundMediaItem {
                            media: media.clone(),
                            caption_html: None,
                        },
                    )
                })
            })
            .collect();
        let Some(&(first_id, _)) = media.first() else {
            return;
        };

        let caption = items
            .iter()
            .find_map(|item| item.kind.caption().filter(|caption| !caption.is_blank()));
        let caption_html = match caption {
            Some(caption) => Some(self.translator.translate_rich(caption, key.translate).await),
            None => None,
        };
        let reply_to = items.first().and_then(|item| {
            let reply_to = item.reply_to_id?;
            self.links.lookup(key.source_chat, reply_to, key.dest.chat)
        });

        for (index, chunk) in media.chunks(MAX_ALBUM_ITEMS).enumerate() {
            let mut outgoing: Vec<OutboundMediaItem> =
                chunk.iter().map(|(_, item)| item.clone()).collect();
            if index == 0
                && let Some(first) = outgoing.first_mut()
            {
                first.caption_html = caption_html.clone();
            }
            let album = OutboundAlbum {
                dest: key.dest,
                items: outgoing,
                reply_to: if index == 0 { reply_to } else { None },
            };

            match self
                .executor
                .run("send_album", key.dest, || self.platform.send_album(&album))
                .await
            {
                Ok(dest_ids) => {
                    if dest_ids.len() != chunk.len() {
                        warn!(
                            source_chat = key.source_chat,
                            album_id = %key.album_id,
                            sent = chunk.len(),
                            returned = dest_ids.len(),
                            "Album reply size mismatch"
                        );
                    }
                    if index == 0
                        && let Some(&caption_carrier) = dest_ids.first()
                    {
                        for (source_id, _) in &media {
                            self.links.save_caption_target(
                                key.source_chat,
                                *source_id,
                                key.dest.chat,
                                caption_carrier,
                            );
                        }
                    }
                    for ((source_id, _), dest_id) in chunk.iter().zip(dest_ids) {
                        self.links
                            .save(key.source_chat, *source_id, key.dest.chat, dest_id);
                    }
                    debug!(
                        source_chat = key.source_chat,
                        album_id = %key.album_id,
                        dest = %key.dest,
                        items = chunk.len(),
                        "Album relayed"
                    );
                }
                Err(e) => {
                    let source_id = chunk.first().map_or(first_id, |(id, _)| *id);
                    self.report(key.source_chat, source_id, key.dest, "send_album", e);
                }
            }
        }
    }
}
