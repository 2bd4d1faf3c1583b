use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crossrelay_traits::{ProviderError, RichText, Translator};

use super::language::looks_like_target;
use super::markup::wrap;
use super::normalize::{Corrections, canonicalize, collapse_spaces, protect_urls, restore_urls};
use super::runs::{Run, partition};
use crate::config::TranslationSettings;

const GLOSSARY_NAME: &str = "crossrelay";

/// Provider-independent translation settings.
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub force_translate: bool,
    pub glossary: Vec<(String, String)>,
    pub corrections: BTreeMap<String, String>,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            source_lang: None,
            target_lang: "EN".to_string(),
            force_translate: false,
            glossary: Vec::new(),
            corrections: BTreeMap::new(),
        }
    }
}

impl From<&TranslationSettings> for TranslatorSettings {
    fn from(settings: &TranslationSettings) -> Self {
        Self {
            source_lang: settings.source_lang.clone(),
            target_lang: settings.target_lang.clone(),
            force_translate: settings.force_translate,
            glossary: settings
                .glossary
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            corrections: settings.corrections.clone(),
        }
    }
}

/// Translates rich text run by run and renders it as Telegram HTML.
///
/// Protected tokens (URLs, mentions, hashtags, commands) and whitespace are
/// never sent to the provider. A failed run falls back to its source text.
pub struct EntityTranslator {
    provider: Option<Arc<dyn Translator>>,
    settings: TranslatorSettings,
    corrections: Corrections,
    glossary_id: OnceCell<String>,
}

impl EntityTranslator {
    pub fn new(provider: Arc<dyn Translator>, settings: TranslatorSettings) -> Self {
        let corrections = Corrections::new(&settings.corrections);
        Self {
            provider: Some(provider),
            settings,
            corrections,
            glossary_id: OnceCell::new(),
        }
    }

    /// A translator that only renders markup.
    pub fn render_only() -> Self {
        Self {
            provider: None,
            settings: TranslatorSettings::default(),
            corrections: Corrections::default(),
            glossary_id: OnceCell::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Render `rich` as HTML, translating visible text when `translate` is set.
    pub async fn translate_rich(&self, rich: &RichText, translate: bool) -> String {
        let runs = partition(rich);

        let Some(provider) = self.provider.as_deref().filter(|_| translate) else {
            return runs.iter().map(|run| wrap(&run.text, &run.spans)).collect();
        };

        let glossary_id = self.glossary_id(provider).await;
        let translated = futures::future::join_all(
            runs.iter()
                .map(|run| self.translate_run(provider, run, glossary_id.as_deref())),
        )
        .await;

        runs.iter()
            .zip(translated)
            .map(|(run, text)| wrap(&text, &run.spans))
            .collect()
    }

    /// Translate unformatted text, e.g. a voice transcript.
    pub async fn translate_plain(&self, text: &str) -> String {
        let Some(provider) = self.provider.as_deref() else {
            return text.to_string();
        };
        let glossary_id = self.glossary_id(provider).await;
        let run = Run {
            text: text.to_string(),
            spans: Vec::new(),
        };
        self.translate_run(provider, &run, glossary_id.as_deref())
            .await
    }

    async fn translate_run(
        &self,
        provider: &dyn Translator,
        run: &Run,
        glossary_id: Option<&str>,
    ) -> String {
        if run.is_protected() || run.is_blank() {
            return run.text.clone();
        }

        let text = run.text.as_str();
        let core = text.trim();
        let start = text.len() - text.trim_start().len();
        let (leading, trailing) = (&text[..start], &text[start + core.len()..]);

        let canonical = canonicalize(core);
        if !self.settings.force_translate
            && looks_like_target(&canonical, &self.settings.target_lang)
        {
            debug!(
                target_lang = %self.settings.target_lang,
                "Run already in target language, skipping translation"
            );
            return run.text.clone();
        }

        let prepared = collapse_spaces(&self.corrections.apply(&canonical));
        let (protected, urls) = protect_urls(&prepared);

        match provider
            .translate(
                &protected,
                self.settings.source_lang.as_deref(),
                &self.settings.target_lang,
                glossary_id,
            )
            .await
        {
            Ok(output) => match restore_urls(&output, &urls) {
                Some(restored) => format!("{leading}{}{trailing}", restored.trim()),
                None => {
                    warn!(
                        provider = provider.provider_name(),
                        "URL placeholder lost in translation, using source text"
                    );
                    run.text.clone()
                }
            },
            Err(e) => {
                warn!(
                    provider = provider.provider_name(),
                    error = %e,
                    "Translation failed, using source text"
                );
                run.text.clone()
            }
        }
    }

    /// Memoized glossary id; failed creation is retried on the next call.
    async fn glossary_id(&self, provider: &dyn Translator) -> Option<String> {
        if self.settings.glossary.is_empty() {
            return None;
        }
        let Some(source_lang) = self.settings.source_lang.as_deref() else {
            debug!("Glossary configured without source_lang, skipping");
            return None;
        };

        let result = self
            .glossary_id
            .get_or_try_init(|| async {
                let id = provider
                    .create_glossary(
                        GLOSSARY_NAME,
                        source_lang,
                        &self.settings.target_lang,
                        &self.settings.glossary,
                    )
                    .await?;
                debug!(glossary_id = %id, "Glossary created");
                Ok::<String, ProviderError>(id)
            })
            .await;

        match result {
            Ok(id) => Some(id.clone()),
            Err(e) => {
                warn!(error = %e, "Glossary creation failed, translating without glossary");
                None
            }
        }
    }
}
