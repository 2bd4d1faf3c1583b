//! Translation and transcription provider traits.
//!
//! Implementations handle the actual provider work, whether through an HTTP
//! API or a deterministic test double.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Generic trait for machine translation providers
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one text into `target_lang`.
    ///
    /// `source_lang` of `None` lets the provider detect the language.
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        glossary_id: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Register a glossary and return its provider-side id.
    async fn create_glossary(
        &self,
        name: &str,
        source_lang: &str,
        target_lang: &str,
        entries: &[(String, String)],
    ) -> Result<String, ProviderError>;

    /// Name used in logs to identify which provider handled a translation.
    fn provider_name(&self) -> &str;
}

/// Speech-to-text provider for voice items.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: Option<&str>,
    ) -> Result<String, ProviderError>;

    fn provider_name(&self) -> &str;
}
