//! Production wiring of the relay engine.

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crossrelay_storage::{DaemonStateStorage, Storage};
use crossrelay_traits::{InboundEvent, OperatorNotifier, Transcriber, Translator};

use crate::channel::{LogNotifier, TelegramClient, TelegramNotifier};
use crate::config::{ConfigError, RelayConfig};
use crate::links::ReplyLinkStore;
use crate::providers::{DeepLTranslator, WhisperTranscriber};
use crate::runtime::{Collaborators, RelayEngine};

/// `daemon_state` key of the Telegram polling offset.
pub const TELEGRAM_OFFSET_KEY: &str = "telegram_offset";

/// A fully wired relay: storage, Telegram client and engine.
pub struct RelayApp {
    pub storage: Arc<Storage>,
    pub telegram: TelegramClient,
    pub engine: Arc<RelayEngine>,
}

impl RelayApp {
    pub fn new(config: &RelayConfig, storage: Storage) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(storage);

        let telegram = build_telegram(config, &storage.daemon_state)?;
        let translator = build_translator(config)?;
        let transcriber = build_transcriber(config)?;

        let notifier: Arc<dyn OperatorNotifier> = match config.telegram.admin_chat_id {
            Some(admin_chat) => Arc::new(TelegramNotifier::new(
                Arc::new(telegram.clone()),
                admin_chat,
            )),
            None => {
                warn!("No admin_chat_id configured, alerts go to the log only");
                Arc::new(LogNotifier)
            }
        };

        let engine = RelayEngine::new(
            config,
            Collaborators {
                platform: Arc::new(telegram.clone()),
                translator,
                transcriber,
                notifier,
            },
            ReplyLinkStore::from_storage(&storage),
        )?;

        Ok(Self {
            storage,
            telegram,
            engine: Arc::new(engine),
        })
    }

    /// Relay Telegram updates until `shutdown` resolves, then drain.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let events = self
            .telegram
            .start_receiving()
            .context("Telegram bot token is empty")?;
        self.run_events(events.take_until(shutdown)).await;
        self.telegram.stop_receiving();
        info!(
            offset = self.telegram.last_update_id(),
            "Telegram polling offset at shutdown"
        );
        Ok(())
    }

    /// Relay an arbitrary event stream to completion.
    pub async fn run_events<S>(&self, events: S)
    where
        S: Stream<Item = InboundEvent> + Send,
    {
        self.engine.clone().run(events).await;
    }
}

fn build_telegram(config: &RelayConfig, state: &DaemonStateStorage) -> Result<TelegramClient> {
    let token = config
        .telegram
        .bot_token
        .as_deref()
        .ok_or(ConfigError::Missing("telegram.bot_token"))?;

    let offset = state
        .get_i64(TELEGRAM_OFFSET_KEY)
        .context("Failed to read Telegram polling offset")?;

    let persist_state = state.clone();
    let mut client = TelegramClient::new(token)
        .with_polling_timeout(config.telegram.polling_timeout)
        .with_last_update_id(offset)
        .with_offset_persister(Arc::new(move |update_id| {
            if let Err(e) = persist_state.set_i64(TELEGRAM_OFFSET_KEY, update_id) {
                warn!(update_id, error = %e, "Failed to persist Telegram polling offset");
            }
        }));
    if let Some(api_base) = &config.telegram.api_base {
        client = client.with_api_base(api_base.as_str());
    }

    info!(offset, "Telegram client ready");
    Ok(client)
}

fn build_translator(config: &RelayConfig) -> Result<Option<Arc<dyn Translator>>> {
    let settings = &config.translation;
    let Some(api_key) = settings.api_key.as_deref().filter(|_| settings.is_enabled()) else {
        info!("No translation key configured, relaying without translation");
        return Ok(None);
    };

    let mut translator =
        DeepLTranslator::new(api_key).context("Failed to create DeepL translator")?;
    if let Some(api_base) = &settings.api_base {
        translator = translator.with_api_base(api_base.as_str());
    }
    info!(
        target_lang = %settings.target_lang,
        source_lang = ?settings.source_lang,
        "Translation enabled"
    );
    Ok(Some(Arc::new(translator)))
}

fn build_transcriber(config: &RelayConfig) -> Result<Option<Arc<dyn Transcriber>>> {
    let settings = &config.transcription;
    if !settings.enabled {
        return Ok(None);
    }
    let api_key = settings
        .api_key
        .as_deref()
        .ok_or(ConfigError::Missing("transcription.api_key"))?;

    let mut transcriber = WhisperTranscriber::new(api_key)
        .context("Failed to create Whisper transcriber")?
        .with_model(settings.model.as_str());
    if let Some(api_base) = &settings.api_base {
        transcriber = transcriber.with_api_base(api_base.as_str());
    }
    info!(model = %settings.model, "Voice transcription enabled");
    Ok(Some(Arc::new(transcriber)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use tempfile::tempdir;

    fn config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.telegram.bot_token = Some("123:ABC".to_string());
        config.routes.push(RouteConfig {
            source_chat: -100,
            source_thread: None,
            dest_chat: -200,
            dest_thread: Some(10),
            sender: None,
            translate: None,
        });
        config
    }

    #[test]
    fn test_app_restores_offset() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("relay.db")).unwrap();
        storage.daemon_state.set_i64(TELEGRAM_OFFSET_KEY, 77).unwrap();

        let app = RelayApp::new(&config(), storage).unwrap();
        assert_eq!(app.telegram.last_update_id(), 77);
        assert_eq!(app.engine.resolver().table().route_count(), 1);
        assert!(!app.engine.resolver().table().translation_enabled());
    }

    #[test]
    fn test_app_enables_translation_with_key() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("relay.db")).unwrap();
        let mut config = config();
        config.translation.api_key = Some("key:fx".to_string());

        let app = RelayApp::new(&config, storage).unwrap();
        assert!(app.engine.resolver().table().translation_enabled());
    }

    #[test]
    fn test_app_rejects_missing_token() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("relay.db")).unwrap();
        let mut config = config();
        config.telegram.bot_token = None;

        assert!(RelayApp::new(&config, storage).is_err());
    }
}
