//! Recording test doubles for the collaborator traits.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crossrelay_traits::{
    Alert, ChatId, DeliveryError, MessageId, OperatorNotifier, OutboundAlbum, OutboundCopy,
    OutboundText, ProviderError, RelayPlatform, Transcriber, Translator,
};

/// One recorded `translate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateCall {
    pub text: String,
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub glossary_id: Option<String>,
}

/// Translator that echoes its input unless a reply is registered.
#[derive(Default)]
pub struct MockTranslator {
    replies: HashMap<String, String>,
    failing: HashSet<String>,
    fail_all: bool,
    glossary_failures: AtomicU32,
    glossary_attempts: AtomicU32,
    calls: Mutex<Vec<TranslateCall>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.replies.insert(input.into(), output.into());
        self
    }

    /// Fail whenever `input` is requested.
    pub fn failing_on(mut self, input: impl Into<String>) -> Self {
        self.failing.insert(input.into());
        self
    }

    pub fn failing_always(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Fail the first `times` glossary creations.
    pub fn failing_glossary_times(self, times: u32) -> Self {
        self.glossary_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<TranslateCall> {
        self.calls.lock().clone()
    }

    pub fn glossary_attempts(&self) -> u32 {
        self.glossary_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        glossary_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.calls.lock().push(TranslateCall {
            text: text.to_string(),
            source_lang: source_lang.map(str::to_string),
            target_lang: target_lang.to_string(),
            glossary_id: glossary_id.map(str::to_string),
        });

        if self.fail_all || self.failing.contains(text) {
            return Err(ProviderError::Http {
                provider: "mock".to_string(),
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self
            .replies
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }

    async fn create_glossary(
        &self,
        _name: &str,
        _source_lang: &str,
        _target_lang: &str,
        _entries: &[(String, String)],
    ) -> Result<String, ProviderError> {
        let attempt = self.glossary_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.glossary_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.glossary_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Request("glossary unavailable".to_string()));
        }
        Ok(format!("glossary-{}", attempt - 1))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    SendText(OutboundText),
    SendAlbum(OutboundAlbum),
    Copy(OutboundCopy),
    EditText {
        chat: ChatId,
        message_id: MessageId,
        html: String,
    },
    EditCaption {
        chat: ChatId,
        message_id: MessageId,
        html: String,
    },
    Download {
        file_id: String,
    },
}

impl PlatformCall {
    pub fn chat(&self) -> Option<ChatId> {
        match self {
            Self::SendText(text) => Some(text.dest.chat),
            Self::SendAlbum(album) => Some(album.dest.chat),
            Self::Copy(copy) => Some(copy.dest.chat),
            Self::EditText { chat, .. } | Self::EditCaption { chat, .. } => Some(*chat),
            Self::Download { .. } => None,
        }
    }
}

/// Platform that records every attempt and hands out increasing message ids.
pub struct MockPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    next_id: AtomicI64,
    queued_failures: Mutex<HashMap<ChatId, VecDeque<DeliveryError>>>,
    permanent_failures: Mutex<HashMap<ChatId, DeliveryError>>,
    file_bytes: Vec<u8>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
            queued_failures: Mutex::new(HashMap::new()),
            permanent_failures: Mutex::new(HashMap::new()),
            file_bytes: b"voice-bytes".to_vec(),
        }
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call addressed to `chat` with `error`.
    pub fn push_failure(&self, chat: ChatId, error: DeliveryError) {
        self.queued_failures
            .lock()
            .entry(chat)
            .or_default()
            .push_back(error);
    }

    /// Fail every call addressed to `chat`.
    pub fn always_fail(&self, chat: ChatId, error: DeliveryError) {
        self.permanent_failures.lock().insert(chat, error);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, chat: ChatId) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.chat() == Some(chat))
            .collect()
    }

    /// Id the next successful call will return.
    pub fn peek_next_id(&self) -> MessageId {
        self.next_id.load(Ordering::SeqCst)
    }

    fn record(&self, call: PlatformCall) -> Result<(), DeliveryError> {
        let chat = call.chat();
        self.calls.lock().push(call);

        let Some(chat) = chat else {
            return Ok(());
        };
        if let Some(error) = self
            .queued_failures
            .lock()
            .get_mut(&chat)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(error) = self.permanent_failures.lock().get(&chat) {
            return Err(error.clone());
        }
        Ok(())
    }

    fn allocate_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayPlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_text(&self, message: &OutboundText) -> Result<MessageId, DeliveryError> {
        self.record(PlatformCall::SendText(message.clone()))?;
        Ok(self.allocate_id())
    }

    async fn send_album(&self, album: &OutboundAlbum) -> Result<Vec<MessageId>, DeliveryError> {
        self.record(PlatformCall::SendAlbum(album.clone()))?;
        Ok(album.items.iter().map(|_| self.allocate_id()).collect())
    }

    async fn copy_message(&self, copy: &OutboundCopy) -> Result<MessageId, DeliveryError> {
        self.record(PlatformCall::Copy(copy.clone()))?;
        Ok(self.allocate_id())
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message_id: MessageId,
        html: &str,
    ) -> Result<(), DeliveryError> {
        self.record(PlatformCall::EditText {
            chat,
            message_id,
            html: html.to_string(),
        })
    }

    async fn edit_caption(
        &self,
        chat: ChatId,
        message_id: MessageId,
        html: &str,
    ) -> Result<(), DeliveryError> {
        self.record(PlatformCall::EditCaption {
            chat,
            message_id,
            html: html.to_string(),
        })
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DeliveryError> {
        self.record(PlatformCall::Download {
            file_id: file_id.to_string(),
        })?;
        Ok(self.file_bytes.clone())
    }
}

/// Transcriber returning a fixed transcript.
pub struct MockTranscriber {
    transcript: Option<String>,
    calls: Mutex<Vec<(Vec<u8>, Option<String>)>>,
}

impl MockTranscriber {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: Some(transcript.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<u8>, Option<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .push((audio, language_hint.map(str::to_string)));
        self.transcript
            .clone()
            .ok_or_else(|| ProviderError::Request("transcription unavailable".to_string()))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Notifier that keeps every alert.
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) {
        self.alerts.lock().push(alert.clone());
    }
}
