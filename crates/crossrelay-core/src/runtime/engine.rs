//! Relay engine - intake loop tying routing, dedup, albums and delivery together.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crossrelay_traits::{InboundEvent, Message, MessageKind, OperatorNotifier, RelayPlatform};
use crossrelay_traits::{Transcriber, Translator};

use super::album::{AlbumKey, MediaGroupAggregator};
use super::relay::RelayContext;
use crate::config::{ConfigError, RelayConfig};
use crate::dedup::DedupGuard;
use crate::delivery::DeliveryExecutor;
use crate::links::ReplyLinkStore;
use crate::routing::{ResolvedRoute, RouteResolver, RouteTable};
use crate::translate::{EntityTranslator, TranslatorSettings};

/// External services the engine talks to.
pub struct Collaborators {
    pub platform: Arc<dyn RelayPlatform>,
    pub translator: Option<Arc<dyn Translator>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub notifier: Arc<dyn OperatorNotifier>,
}

/// One relay instance: immutable routing plus the caches that live with it.
pub struct RelayEngine {
    resolver: RouteResolver,
    dedup: DedupGuard,
    context: Arc<RelayContext>,
    albums: MediaGroupAggregator,
}

impl RelayEngine {
    /// Build an engine from validated configuration.
    pub fn new(
        config: &RelayConfig,
        collaborators: Collaborators,
        links: ReplyLinkStore,
    ) -> Result<Self, ConfigError> {
        let table = RouteTable::from_config(config)?
            .with_translation_enabled(collaborators.translator.is_some());

        let translator = match collaborators.translator {
            Some(provider) => {
                EntityTranslator::new(provider, TranslatorSettings::from(&config.translation))
            }
            None => EntityTranslator::render_only(),
        };

        let transcriber = collaborators
            .transcriber
            .filter(|_| config.transcription.enabled);

        let context = Arc::new(RelayContext {
            platform: collaborators.platform,
            translator,
            links,
            executor: DeliveryExecutor::new(config.relay.retry.clone()),
            notifier: collaborators.notifier,
            transcriber,
            language_hint: config.transcription.language_hint.clone(),
        });

        Ok(Self::from_parts(
            table,
            DedupGuard::new(
                Duration::from_secs(config.relay.dedup_ttl_secs),
                config.relay.dedup_max_entries,
                Default::default(),
            ),
            context,
            Duration::from_millis(config.relay.album_debounce_ms),
        ))
    }

    /// Assemble an engine from prebuilt parts.
    ///
    /// The dedup guard's destination set is replaced by the table's.
    pub fn from_parts(
        table: RouteTable,
        dedup: DedupGuard,
        context: Arc<RelayContext>,
        album_debounce: Duration,
    ) -> Self {
        let dedup = dedup.with_destinations(table.destinations());
        let albums = MediaGroupAggregator::new(album_debounce, context.clone());
        Self {
            resolver: RouteResolver::new(table),
            dedup,
            context,
            albums,
        }
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn context(&self) -> &RelayContext {
        &self.context
    }

    /// Buckets still waiting for their debounce window.
    pub fn pending_albums(&self) -> usize {
        self.albums.pending()
    }

    /// Process one inbound event to completion (albums excepted).
    pub async fn handle_event(&self, event: InboundEvent) {
        let message = event.message();
        if self.dedup.is_destination(message.location, message.thread) {
            debug!(
                source_chat = message.location,
                message_id = message.id,
                "Ignoring message in a destination location"
            );
            return;
        }

        match event {
            InboundEvent::New(message) => self.handle_new(message).await,
            InboundEvent::Edited(message) => self.handle_edit(message).await,
        }
    }

    async fn handle_new(&self, message: Message) {
        if self.dedup.seen(message.location, message.id) {
            debug!(
                source_chat = message.location,
                message_id = message.id,
                "Duplicate message dropped"
            );
            return;
        }

        let routes = self.routes_for(&message);
        if routes.is_empty() {
            return;
        }

        if let (Some(album_id), MessageKind::Media { .. }) = (&message.album_id, &message.kind) {
            for route in routes {
                let key = AlbumKey {
                    source_chat: message.location,
                    album_id: album_id.clone(),
                    dest: route.dest,
                    translate: route.translate,
                };
                self.albums.handle(key, message.clone());
            }
            return;
        }

        futures::future::join_all(
            routes
                .into_iter()
                .map(|route| self.context.deliver_new(&message, route)),
        )
        .await;
    }

    async fn handle_edit(&self, message: Message) {
        let revision = message.edit_date.unwrap_or_default();
        if self.dedup.seen_edit(message.location, message.id, revision) {
            debug!(
                source_chat = message.location,
                message_id = message.id,
                revision,
                "Duplicate edit dropped"
            );
            return;
        }

        let routes = self.routes_for(&message);
        futures::future::join_all(
            routes
                .into_iter()
                .map(|route| self.context.deliver_edit(&message, route)),
        )
        .await;
    }

    fn routes_for(&self, message: &Message) -> Vec<ResolvedRoute> {
        let routes = self
            .resolver
            .resolve(message.location, message.thread, message.sender_id);
        debug!(
            source_chat = message.location,
            thread = message.thread_key(),
            message_id = message.id,
            routes = routes.len(),
            "Resolved routes"
        );
        routes
    }

    /// Consume `events` with one task per event until the stream ends.
    ///
    /// Waits for in-flight tasks and flushes pending albums before returning.
    pub async fn run<S>(self: Arc<Self>, events: S)
    where
        S: Stream<Item = InboundEvent> + Send,
    {
        info!(
            routes = self.resolver.table().route_count(),
            fanout = self.resolver.table().fanout_count(),
            translation = self.resolver.table().translation_enabled(),
            "Relay engine started"
        );

        let mut tasks = JoinSet::new();
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            let engine = self.clone();
            tasks.spawn(async move { engine.handle_event(event).await });

            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    warn!(error = %e, "Relay task panicked");
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!(error = %e, "Relay task panicked");
            }
        }
        self.shutdown().await;
    }

    /// Flush pending album buckets.
    pub async fn shutdown(&self) {
        let pending = self.albums.pending();
        if pending > 0 {
            info!(buckets = pending, "Flushing pending albums");
        }
        self.albums.drain().await;
        info!("Relay engine stopped");
    }
}
