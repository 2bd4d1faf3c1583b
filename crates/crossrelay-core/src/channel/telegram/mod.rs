//! Telegram Bot API client.
//!
//! Implements [`RelayPlatform`] for outbound calls and exposes long-polling
//! `getUpdates` as a stream of [`InboundEvent`]s.

mod api;
mod error;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crossrelay_traits::{
    ChatId, DeliveryError, Destination, InboundEvent, MediaKind, MessageId, OutboundAlbum,
    OutboundCopy, OutboundText, RelayPlatform,
};

use api::{TelegramFile, TelegramMessageRef, TelegramResponse, TelegramUpdate};
use error::TelegramApiError;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;
/// Pause after a failed poll.
const POLL_ERROR_BACKOFF_SECS: u64 = 5;
const ALLOWED_UPDATES: [&str; 4] = [
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
];

/// Telegram platform client.
#[derive(Clone)]
pub struct TelegramClient {
    bot_token: String,
    api_base: String,
    polling_timeout: u32,
    client: Client,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
    /// Persist the polling offset when it changes.
    offset_persister: Option<Arc<dyn Fn(i64) + Send + Sync>>,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            polling_timeout: 30,
            client: Client::new(),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
            offset_persister: None,
        }
    }

    /// Point the client at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }

    /// Restore the last processed update ID.
    pub fn with_last_update_id(self, update_id: i64) -> Self {
        self.last_update_id.store(update_id, Ordering::SeqCst);
        self
    }

    /// Persist offset after each successful polling batch.
    pub fn with_offset_persister(mut self, persister: Arc<dyn Fn(i64) + Send + Sync>) -> Self {
        self.offset_persister = Some(persister);
        self
    }

    pub fn last_update_id(&self) -> i64 {
        self.last_update_id.load(Ordering::SeqCst)
    }

    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty()
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
        timeout: Duration,
    ) -> Result<T, TelegramApiError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(TelegramApiError::from_reqwest)?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(TelegramApiError::from_reqwest)?;
        let data: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(TelegramApiError::from_response(status, &data, &raw));
        }

        let body: TelegramResponse<T> = serde_json::from_value(data.clone()).map_err(|e| {
            TelegramApiError {
                status: Some(status),
                error_code: None,
                retry_after_secs: None,
                body: format!("unexpected {method} response: {e}"),
            }
        })?;
        match body.result {
            Some(result) if body.ok => Ok(result),
            _ => {
                let mut err = TelegramApiError::from_response(status, &data, &raw);
                if let Some(description) = body.description {
                    err.body = description;
                }
                Err(err)
            }
        }
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, DeliveryError> {
        self.call(method, &params, Duration::from_secs(API_TIMEOUT_SECS))
            .await
            .map_err(TelegramApiError::into_delivery_error)
    }

    async fn edit(&self, method: &str, params: Value) -> Result<(), DeliveryError> {
        match self
            .call::<Value>(method, &params, Duration::from_secs(API_TIMEOUT_SECS))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => {
                debug!(method, "Edit left message unchanged");
                Ok(())
            }
            Err(e) => Err(e.into_delivery_error()),
        }
    }

    /// Poll for updates using long-polling
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>, TelegramApiError> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.polling_timeout,
            "allowed_updates": ALLOWED_UPDATES,
        });

        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(self.polling_timeout as u64 + 10),
            )
            .await?;

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
            if let Some(persister) = &self.offset_persister {
                persister(last.update_id);
            }
        }

        Ok(updates)
    }

    /// Start long-polling and return the inbound event stream.
    ///
    /// Returns `None` when no bot token is configured.
    pub fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundEvent> + Send>>> {
        if !self.is_configured() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = self.clone();
        self.polling_active.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            info!(
                offset = channel.last_update_id(),
                "Starting Telegram polling"
            );

            while channel.polling_active.load(Ordering::SeqCst) {
                match channel.poll_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            let update_id = update.update_id;
                            let Some(event) = update.into_event() else {
                                continue;
                            };
                            debug!(
                                update_id,
                                chat = event.message().location,
                                message_id = event.message().id,
                                edit = event.is_edit(),
                                "Received Telegram update"
                            );
                            if tx.send(event).is_err() {
                                warn!("Event receiver dropped, stopping polling");
                                channel.polling_active.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    Err(e) if e.is_rate_limited() => {
                        let wait = e.retry_after_secs.unwrap_or(POLL_ERROR_BACKOFF_SECS);
                        warn!(wait_secs = wait, "Telegram polling rate limited");
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                    Err(e) => {
                        error!(error = %e, "Telegram polling error");
                        tokio::time::sleep(Duration::from_secs(POLL_ERROR_BACKOFF_SECS)).await;
                    }
                }
            }

            info!("Telegram polling stopped");
        });

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }

    /// Ask the polling task to stop after its current request.
    pub fn stop_receiving(&self) {
        self.polling_active.store(false, Ordering::SeqCst);
    }
}

fn with_destination(params: &mut Value, dest: Destination, reply_to: Option<MessageId>) {
    if let Some(thread_id) = dest.platform_thread() {
        params["message_thread_id"] = json!(thread_id);
    }
    if let Some(message_id) = reply_to {
        params["reply_parameters"] = json!({
            "message_id": message_id,
            "allow_sending_without_reply": true,
        });
    }
}

fn single_media_method(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "sendPhoto",
        MediaKind::Video => "sendVideo",
        MediaKind::Document => "sendDocument",
        MediaKind::Audio => "sendAudio",
        MediaKind::Animation => "sendAnimation",
    }
}

#[async_trait]
impl RelayPlatform for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, message: &OutboundText) -> Result<MessageId, DeliveryError> {
        let mut params = json!({
            "chat_id": message.dest.chat,
            "text": message.html,
            "parse_mode": "HTML",
        });
        with_destination(&mut params, message.dest, message.reply_to);

        let sent: TelegramMessageRef = self.send("sendMessage", params).await?;
        Ok(sent.message_id)
    }

    async fn send_album(&self, album: &OutboundAlbum) -> Result<Vec<MessageId>, DeliveryError> {
        // sendMediaGroup needs at least two items.
        if let [item] = album.items.as_slice() {
            let mut params = json!({ "chat_id": album.dest.chat });
            params[item.media.kind.input_media_type()] = json!(item.media.file_id);
            if let Some(caption) = &item.caption_html {
                params["caption"] = json!(caption);
                params["parse_mode"] = json!("HTML");
            }
            with_destination(&mut params, album.dest, album.reply_to);

            let sent: TelegramMessageRef = self
                .send(single_media_method(item.media.kind), params)
                .await?;
            return Ok(vec![sent.message_id]);
        }

        let media: Vec<Value> = album
            .items
            .iter()
            .map(|item| {
                let mut entry = json!({
                    "type": item.media.kind.input_media_type(),
                    "media": item.media.file_id,
                });
                if let Some(caption) = &item.caption_html {
                    entry["caption"] = json!(caption);
                    entry["parse_mode"] = json!("HTML");
                }
                entry
            })
            .collect();
        let mut params = json!({
            "chat_id": album.dest.chat,
            "media": media,
        });
        with_destination(&mut params, album.dest, album.reply_to);

        let sent: Vec<TelegramMessageRef> = self.send("sendMediaGroup", params).await?;
        Ok(sent.into_iter().map(|message| message.message_id).collect())
    }

    async fn copy_message(&self, copy: &OutboundCopy) -> Result<MessageId, DeliveryError> {
        let mut params = json!({
            "chat_id": copy.dest.chat,
            "from_chat_id": copy.from_chat,
            "message_id": copy.message_id,
        });
        if let Some(caption) = &copy.caption_html {
            params["caption"] = json!(caption);
            params["parse_mode"] = json!("HTML");
        }
        with_destination(&mut params, copy.dest, copy.reply_to);

        let copied: TelegramMessageRef = self.send("copyMessage", params).await?;
        Ok(copied.message_id)
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message_id: MessageId,
        html: &str,
    ) -> Result<(), DeliveryError> {
        self.edit(
            "editMessageText",
            json!({
                "chat_id": chat,
                "message_id": message_id,
                "text": html,
                "parse_mode": "HTML",
            }),
        )
        .await
    }

    async fn edit_caption(
        &self,
        chat: ChatId,
        message_id: MessageId,
        html: &str,
    ) -> Result<(), DeliveryError> {
        self.edit(
            "editMessageCaption",
            json!({
                "chat_id": chat,
                "message_id": message_id,
                "caption": html,
                "parse_mode": "HTML",
            }),
        )
        .await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DeliveryError> {
        let file: TelegramFile = self.send("getFile", json!({ "file_id": file_id })).await?;
        let Some(file_path) = file.file_path else {
            return Err(DeliveryError::permanent(format!(
                "file {file_id} has no download path"
            )));
        };

        let response = self
            .client
            .get(self.file_url(&file_path))
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| TelegramApiError::from_reqwest(e).into_delivery_error())?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(
                TelegramApiError::from_response(status, &Value::Null, &raw).into_delivery_error(),
            );
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TelegramApiError::from_reqwest(e).into_delivery_error())?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossrelay_traits::{MediaRef, OutboundMediaItem};
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123:ABC";

    async fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(TOKEN).with_api_base(server.uri())
    }

    fn ok(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
    }

    #[test]
    fn test_api_url() {
        let client = TelegramClient::new(TOKEN);
        assert_eq!(
            client.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
        assert_eq!(
            client.file_url("voice/file_1.oga"),
            "https://api.telegram.org/file/bot123:ABC/voice/file_1.oga"
        );
    }

    #[test]
    fn test_restore_last_update_id() {
        let client = TelegramClient::new(TOKEN).with_last_update_id(123);
        assert_eq!(client.last_update_id(), 123);
        assert!(client.is_configured());
        assert!(!TelegramClient::new("").is_configured());
    }

    #[tokio::test]
    async fn test_send_text_uses_html_thread_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": -200,
                "text": "<b>Hello</b>",
                "parse_mode": "HTML",
                "message_thread_id": 10,
                "reply_parameters": {
                    "message_id": 77,
                    "allow_sending_without_reply": true
                }
            })))
            .respond_with(ok(json!({ "message_id": 501 })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .await
            .send_text(&OutboundText {
                dest: Destination::new(-200, 10),
                html: "<b>Hello</b>".to_string(),
                reply_to: Some(77),
            })
            .await
            .unwrap();
        assert_eq!(id, 501);
    }

    #[tokio::test]
    async fn test_general_thread_omits_thread_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ok(json!({ "message_id": 1 })))
            .mount(&server)
            .await;

        client(&server)
            .await
            .send_text(&OutboundText {
                dest: Destination::new(-200, 1),
                html: "hi".to_string(),
                reply_to: None,
            })
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("message_thread_id").is_none());
        assert!(body.get("reply_parameters").is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/copyMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 3",
                "parameters": { "retry_after": 3 }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .copy_message(&OutboundCopy {
                dest: Destination::new(-200, 1),
                from_chat: -100,
                message_id: 5,
                caption_html: None,
                reply_to: None,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::RateLimited {
                retry_after_secs: 3
            }
        );
    }

    #[tokio::test]
    async fn test_forbidden_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot is not a member of the channel chat"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .send_text(&OutboundText {
                dest: Destination::new(-200, 1),
                html: "hi".to_string(),
                reply_to: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_copy_with_caption_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/copyMessage"))
            .and(body_partial_json(json!({
                "chat_id": -200,
                "from_chat_id": -100,
                "message_id": 5,
                "caption": "<i>Look</i>",
                "parse_mode": "HTML"
            })))
            .respond_with(ok(json!({ "message_id": 900 })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .await
            .copy_message(&OutboundCopy {
                dest: Destination::new(-200, 1),
                from_chat: -100,
                message_id: 5,
                caption_html: Some("<i>Look</i>".to_string()),
                reply_to: None,
            })
            .await
            .unwrap();
        assert_eq!(id, 900);
    }

    #[tokio::test]
    async fn test_media_group_returns_ids_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMediaGroup"))
            .and(body_partial_json(json!({
                "media": [
                    { "type": "photo", "media": "a", "caption": "Cap", "parse_mode": "HTML" },
                    { "type": "video", "media": "b" }
                ]
            })))
            .respond_with(ok(json!([{ "message_id": 11 }, { "message_id": 12 }])))
            .expect(1)
            .mount(&server)
            .await;

        let ids = client(&server)
            .await
            .send_album(&OutboundAlbum {
                dest: Destination::new(-200, 1),
                items: vec![
                    OutboundMediaItem {
                        media: MediaRef::new(MediaKind::Photo, "a"),
                        caption_html: Some("Cap".to_string()),
                    },
                    OutboundMediaItem {
                        media: MediaRef::new(MediaKind::Video, "b"),
                        caption_html: None,
                    },
                ],
                reply_to: None,
            })
            .await
            .unwrap();
        assert_eq!(ids, vec![11, 12]);
    }

    #[tokio::test]
    async fn test_single_item_album_uses_send_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendPhoto"))
            .and(body_partial_json(json!({ "photo": "a" })))
            .respond_with(ok(json!({ "message_id": 21 })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = client(&server)
            .await
            .send_album(&OutboundAlbum {
                dest: Destination::new(-200, 1),
                items: vec![OutboundMediaItem {
                    media: MediaRef::new(MediaKind::Photo, "a"),
                    caption_html: None,
                }],
                reply_to: None,
            })
            .await
            .unwrap();
        assert_eq!(ids, vec![21]);
    }

    #[tokio::test]
    async fn test_edit_not_modified_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified"
            })))
            .mount(&server)
            .await;

        client(&server)
            .await
            .edit_text(-200, 5, "same")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_download_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getFile"))
            .respond_with(ok(json!({
                "file_id": "v1",
                "file_unique_id": "u1",
                "file_path": "voice/file_1.oga"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file/bot123:ABC/voice/file_1.oga"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"OggS".to_vec()))
            .mount(&server)
            .await;

        let bytes = client(&server).await.download_file("v1").await.unwrap();
        assert_eq!(bytes, b"OggS");
    }

    #[tokio::test]
    async fn test_polling_streams_events_and_persists_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .and(body_partial_json(json!({ "offset": 0 })))
            .respond_with(ok(json!([
                {
                    "update_id": 41,
                    "message": {
                        "message_id": 1,
                        "chat": { "id": -100 },
                        "text": "Hola"
                    }
                },
                { "update_id": 42 },
                {
                    "update_id": 43,
                    "edited_message": {
                        "message_id": 1,
                        "chat": { "id": -100 },
                        "edit_date": 5,
                        "text": "Hola!"
                    }
                }
            ])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ok(json!([])).set_delay(Duration::from_millis(50)))
            .mount(&server)
            .await;

        let observed = Arc::new(AtomicI64::new(0));
        let observer = observed.clone();
        let client = client(&server)
            .await
            .with_polling_timeout(0)
            .with_offset_persister(Arc::new(move |value| {
                observer.store(value, Ordering::SeqCst)
            }));

        let mut events = client.start_receiving().unwrap();
        let first = events.next().await.unwrap();
        let second = events.next().await.unwrap();
        client.stop_receiving();

        assert!(!first.is_edit());
        assert!(second.is_edit());
        assert_eq!(observed.load(Ordering::SeqCst), 43);
        assert_eq!(client.last_update_id(), 43);
    }
}
