//! Relay configuration model.
//!
//! The whole file is parsed once at startup into [`RelayConfig`] and is
//! read-only afterwards. Locating the file is left to the CLI; this module
//! owns the schema, defaults, environment overrides and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crossrelay_traits::{ChatId, ThreadId, UserId};

use crate::delivery::RetryPolicy;

/// Telegram's `GroupAnonymousBot` user id, the sender of anonymous admin posts.
pub const DEFAULT_ANONYMOUS_ADMIN_ID: UserId = 1_087_968_824;

/// Fatal configuration problems, reported before the relay starts serving.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("route loop: destination {chat}:{thread} is also a relay source")]
    RouteLoop { chat: ChatId, thread: ThreadId },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub telegram: TelegramSettings,
    pub translation: TranslationSettings,
    pub transcription: TranscriptionSettings,
    pub relay: RelaySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub routes: Vec<RouteConfig>,
    pub fanout: Vec<FanoutConfig>,
    pub no_translate: Vec<EdgeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    pub bot_token: Option<String>,
    /// Long-polling timeout in seconds
    pub polling_timeout: u32,
    /// Operator chat that receives delivery alerts
    pub admin_chat_id: Option<ChatId>,
    /// Sender id that passes every sender restriction
    pub anonymous_admin_id: UserId,
    /// Bot API base URL override
    pub api_base: Option<String>,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            polling_timeout: 30,
            admin_chat_id: None,
            anonymous_admin_id: DEFAULT_ANONYMOUS_ADMIN_ID,
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// DeepL auth key; translation is disabled when absent
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub target_lang: String,
    /// Source language; auto-detected when absent
    pub source_lang: Option<String>,
    /// Translate even when text already looks like the target language
    pub force_translate: bool,
    /// Source term -> target term
    pub glossary: BTreeMap<String, String>,
    /// Typo or phrase corrections applied before translation
    pub corrections: BTreeMap<String, String>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            target_lang: "EN".to_string(),
            source_lang: None,
            force_translate: false,
            glossary: BTreeMap::new(),
            corrections: BTreeMap::new(),
        }
    }
}

impl TranslationSettings {
    pub fn is_enabled(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub enabled: bool,
    /// OpenAI API key
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: String,
    pub language_hint: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            api_base: None,
            model: "whisper-1".to_string(),
            language_hint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub dedup_ttl_secs: u64,
    pub dedup_max_entries: usize,
    pub album_debounce_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: 120,
            dedup_max_entries: 5_000,
            album_debounce_ms: 600,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for daily-rolling log files; stderr only when absent
    pub dir: Option<PathBuf>,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: Option<String>,
}

/// Primary route for one source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub source_chat: ChatId,
    #[serde(default)]
    pub source_thread: Option<ThreadId>,
    pub dest_chat: ChatId,
    #[serde(default)]
    pub dest_thread: Option<ThreadId>,
    /// Only relay posts from this sender
    #[serde(default)]
    pub sender: Option<UserId>,
    /// `false` relays this route without translation
    #[serde(default)]
    pub translate: Option<bool>,
}

/// Additional destination for a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutConfig {
    pub source_chat: ChatId,
    #[serde(default)]
    pub source_thread: Option<ThreadId>,
    pub dest_chat: ChatId,
    #[serde(default)]
    pub dest_thread: Option<ThreadId>,
}

/// A single source -> destination edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub source_chat: ChatId,
    #[serde(default)]
    pub source_thread: Option<ThreadId>,
    pub dest_chat: ChatId,
    #[serde(default)]
    pub dest_thread: Option<ThreadId>,
}

impl RelayConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Override secrets from the environment.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(key) = non_empty("DEEPL_API_KEY") {
            self.translation.api_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.transcription.api_key = Some(key);
        }
    }

    /// Check settings that do not depend on the route graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .telegram
            .bot_token
            .as_deref()
            .is_none_or(|token| token.trim().is_empty())
        {
            return Err(ConfigError::Missing("telegram.bot_token"));
        }
        if self.translation.target_lang.trim().is_empty() {
            return Err(ConfigError::Missing("translation.target_lang"));
        }
        if self.transcription.enabled && self.transcription.api_key.is_none() {
            return Err(ConfigError::Missing("transcription.api_key"));
        }
        if self.relay.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "relay.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.relay.dedup_max_entries == 0 {
            return Err(ConfigError::Invalid(
                "relay.dedup_max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
