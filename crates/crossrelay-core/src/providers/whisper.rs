//! Whisper speech-to-text provider.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crossrelay_traits::{ProviderError, Transcriber};

use super::http_client::{build_http_client, http_error};

const OPENAI_API_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "whisper-1";
const PROVIDER: &str = "Whisper";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// [`Transcriber`] backed by the OpenAI transcription endpoint.
pub struct WhisperTranscriber {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("OpenAI API key".to_string()));
        }
        Ok(Self {
            client: build_http_client()?,
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: Option<&str>,
    ) -> Result<String, ProviderError> {
        // Telegram voice notes are Ogg/Opus.
        let file = Part::bytes(audio)
            .file_name("voice.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let mut form = Form::new().part("file", file).text("model", self.model.clone());
        if let Some(language) = language_hint {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(http_error(PROVIDER, response).await);
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(body.text.trim().to_string())
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}
