//! End-to-end relay behaviour against recording collaborators.

use futures::stream;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{Duration, sleep};

use crossrelay_core::config::{FanoutConfig, RouteConfig};
use crossrelay_core::testkit::{
    MockPlatform, MockTranscriber, MockTranslator, PlatformCall, RecordingNotifier,
};
use crossrelay_core::{Collaborators, RelayConfig, RelayEngine, ReplyLinkStore};
use crossrelay_storage::Storage;
use crossrelay_traits::{
    DeliveryError, Destination, InboundEvent, MediaKind, MediaRef, Message, MessageKind, RichText,
    Transcriber, Translator,
};

const A: i64 = -1001;
const B: i64 = -1002;
const C: i64 = -1003;
const D: i64 = -1004;

struct Harness {
    engine: Arc<RelayEngine>,
    platform: Arc<MockPlatform>,
    translator: Arc<MockTranslator>,
    notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

impl Harness {
    fn new(config: RelayConfig, translator: MockTranslator) -> Self {
        Self::build(config, translator, None)
    }

    fn build(
        config: RelayConfig,
        translator: MockTranslator,
        transcriber: Option<Arc<MockTranscriber>>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("relay.db")).unwrap();
        let platform = Arc::new(MockPlatform::new());
        let translator = Arc::new(translator);
        let notifier = Arc::new(RecordingNotifier::new());

        let engine = RelayEngine::new(
            &config,
            Collaborators {
                platform: platform.clone(),
                translator: Some(translator.clone() as Arc<dyn Translator>),
                transcriber: transcriber.map(|t| t as Arc<dyn Transcriber>),
                notifier: notifier.clone(),
            },
            ReplyLinkStore::from_storage(&storage),
        )
        .unwrap();

        Self {
            engine: Arc::new(engine),
            platform,
            translator,
            notifier,
            _dir: dir,
        }
    }

    async fn send(&self, message: Message) {
        self.engine.handle_event(InboundEvent::New(message)).await;
    }

    async fn edit(&self, message: Message) {
        self.engine.handle_event(InboundEvent::Edited(message)).await;
    }

    /// Let spawned alert tasks run.
    async fn alerts(&self) -> Vec<crossrelay_traits::Alert> {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        self.notifier.alerts()
    }

    fn link(&self, source_message_id: i64, dest_chat: i64) -> Option<i64> {
        self.engine
            .context()
            .links
            .lookup(A, source_message_id, dest_chat)
    }
}

fn route(translate: Option<bool>) -> RouteConfig {
    RouteConfig {
        source_chat: A,
        source_thread: None,
        dest_chat: B,
        dest_thread: Some(10),
        sender: None,
        translate,
    }
}

fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.routes.push(route(None));
    config
}

fn hola() -> MockTranslator {
    MockTranslator::new()
        .with_reply("Hola mundo", "Hello world")
        .with_reply("Hola amigos", "Hello friends")
        .with_reply("Hola a todos", "Hello everyone")
}

fn photo(id: i64, caption: Option<&str>) -> Message {
    Message::new(
        id,
        A,
        MessageKind::Media {
            media: MediaRef::new(MediaKind::Photo, format!("photo-{id}")),
            caption: caption.map(RichText::plain),
        },
    )
}

fn sent_texts(platform: &MockPlatform) -> Vec<(Destination, String, Option<i64>)> {
    platform
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            PlatformCall::SendText(text) => Some((text.dest, text.html, text.reply_to)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_unrouted_message_makes_no_calls() {
    let harness = Harness::new(config(), hola());

    harness.send(Message::text(1, -9999, "Hola mundo")).await;

    assert!(harness.platform.calls().is_empty());
    assert!(harness.translator.calls().is_empty());
}

#[tokio::test]
async fn test_translated_text_reaches_destination_and_is_linked() {
    let harness = Harness::new(config(), hola());

    harness.send(Message::text(1, A, "Hola mundo")).await;

    assert_eq!(harness.translator.calls().len(), 1);
    assert_eq!(
        sent_texts(&harness.platform),
        vec![(Destination::new(B, 10), "Hello world".to_string(), None)]
    );
    assert_eq!(harness.link(1, B), Some(1000));
}

#[tokio::test]
async fn test_untranslated_route_is_byte_identical() {
    let mut config = RelayConfig::default();
    config.routes.push(route(Some(false)));
    let harness = Harness::new(config, hola());

    harness.send(Message::text(1, A, "Hola mundo")).await;

    assert!(harness.translator.calls().is_empty());
    assert_eq!(
        sent_texts(&harness.platform),
        vec![(Destination::new(B, 10), "Hola mundo".to_string(), None)]
    );
}

#[tokio::test]
async fn test_duplicate_within_ttl_is_dropped() {
    let harness = Harness::new(config(), hola());

    harness.send(Message::text(1, A, "Hola mundo")).await;
    harness.send(Message::text(1, A, "Hola mundo")).await;

    assert_eq!(harness.platform.calls().len(), 1);
    assert_eq!(harness.translator.calls().len(), 1);
    assert_eq!(harness.engine.context().links.count(), 1);
}

#[tokio::test]
async fn test_reply_is_mapped_to_relayed_counterpart() {
    let harness = Harness::new(config(), hola());

    harness.send(Message::text(1, A, "Hola mundo")).await;
    harness
        .send(Message::text(2, A, "Hola amigos").with_reply_to(1))
        .await;
    harness
        .send(Message::text(3, A, "Hola a todos").with_reply_to(99))
        .await;

    let texts = sent_texts(&harness.platform);
    assert_eq!(texts[1].2, Some(1000));
    assert_eq!(texts[2].2, None);
}

#[tokio::test(start_paused = true)]
async fn test_album_is_sent_once_with_single_caption() {
    let harness = Harness::new(config(), hola());

    for message in [
        photo(12, Some("Hola amigos")),
        photo(11, None),
        photo(13, None),
    ] {
        harness.send(message.with_album("g1")).await;
        sleep(Duration::from_millis(100)).await;
    }
    assert!(harness.platform.calls().is_empty());

    sleep(Duration::from_millis(700)).await;

    let calls = harness.platform.calls();
    assert_eq!(calls.len(), 1);
    let PlatformCall::SendAlbum(album) = &calls[0] else {
        panic!("expected one album call, got {calls:?}");
    };
    assert_eq!(album.dest, Destination::new(B, 10));
    assert_eq!(album.items.len(), 3);
    assert_eq!(album.items[0].media.file_id, "photo-11");
    assert_eq!(album.items[0].caption_html.as_deref(), Some("Hello friends"));
    assert!(album.items[1..].iter().all(|item| item.caption_html.is_none()));

    assert_eq!(harness.translator.calls().len(), 1);
    assert_eq!(harness.link(11, B), Some(1000));
    assert_eq!(harness.link(12, B), Some(1001));
    assert_eq!(harness.link(13, B), Some(1002));
}

#[tokio::test]
async fn test_run_drains_albums_at_end_of_stream() {
    let harness = Harness::new(config(), hola());
    let events = vec![
        InboundEvent::New(photo(1, None).with_album("g2")),
        InboundEvent::New(photo(2, None).with_album("g2")),
        InboundEvent::New(Message::text(3, A, "Hola mundo")),
    ];

    harness.engine.clone().run(stream::iter(events)).await;

    let calls = harness.platform.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().any(|call| matches!(
        call,
        PlatformCall::SendAlbum(album) if album.items.len() == 2
    )));
    assert_eq!(harness.engine.pending_albums(), 0);
}

#[tokio::test]
async fn test_edit_without_record_is_dropped() {
    let harness = Harness::new(config(), hola());

    harness
        .engine
        .handle_event(InboundEvent::Edited(
            Message::text(50, A, "Hola mundo").with_edit_date(10),
        ))
        .await;

    assert!(harness.platform.calls().is_empty());
}

#[tokio::test]
async fn test_edit_updates_relayed_text() {
    let harness = Harness::new(config(), hola());

    harness.send(Message::text(1, A, "Hola amigos")).await;
    harness
        .engine
        .handle_event(InboundEvent::Edited(
            Message::text(1, A, "Hola mundo").with_edit_date(10),
        ))
        .await;

    let calls = harness.platform.calls();
    assert_eq!(
        calls[1],
        PlatformCall::EditText {
            chat: B,
            message_id: 1000,
            html: "Hello world".to_string(),
        }
    );
}

#[tokio::test]
async fn test_caption_edit_uses_edit_caption() {
    let harness = Harness::new(config(), hola());

    harness.send(photo(1, Some("Hola amigos"))).await;
    harness
        .engine
        .handle_event(InboundEvent::Edited(
            photo(1, Some("Hola mundo")).with_edit_date(3),
        ))
        .await;

    assert_eq!(
        harness.platform.calls()[1],
        PlatformCall::EditCaption {
            chat: B,
            message_id: 1000,
            html: "Hello world".to_string(),
        }
    );
}

#[tokio::test]
async fn test_media_caption_override_only_when_translating() {
    let mut config = config();
    config.routes.push(RouteConfig {
        source_chat: C,
        source_thread: None,
        dest_chat: D,
        dest_thread: None,
        sender: None,
        translate: Some(false),
    });
    let harness = Harness::new(config, hola());

    harness.send(photo(1, Some("Hola amigos"))).await;
    let mut untranslated = photo(2, Some("Hola amigos"));
    untranslated.location = C;
    harness.send(untranslated).await;

    let copies: Vec<_> = harness
        .platform
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            PlatformCall::Copy(copy) => Some((copy.dest.chat, copy.caption_html)),
            _ => None,
        })
        .collect();
    assert_eq!(
        copies,
        vec![(B, Some("Hello friends".to_string())), (D, None)]
    );
}

#[tokio::test]
async fn test_permanent_failure_on_one_edge_spares_siblings() {
    let mut config = config();
    for dest_chat in [C, D] {
        config.fanout.push(FanoutConfig {
            source_chat: A,
            source_thread: None,
            dest_chat,
            dest_thread: None,
        });
    }
    let harness = Harness::new(config, hola());
    harness
        .platform
        .always_fail(C, DeliveryError::permanent("Forbidden: bot was kicked"));

    harness.send(Message::text(1, A, "Hola mundo")).await;

    assert_eq!(harness.platform.calls_to(B).len(), 1);
    assert_eq!(harness.platform.calls_to(C).len(), 1);
    assert_eq!(harness.platform.calls_to(D).len(), 1);
    assert!(harness.link(1, B).is_some());
    assert!(harness.link(1, C).is_none());
    assert!(harness.link(1, D).is_some());

    let alerts = harness.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].dest.chat, C);
    assert_eq!(alerts[0].operation, "send_text");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_transient_failure_does_not_alert() {
    let harness = Harness::new(config(), hola());
    harness
        .platform
        .always_fail(B, DeliveryError::transient("connection reset"));

    harness.send(Message::text(1, A, "Hola mundo")).await;

    assert_eq!(harness.platform.calls_to(B).len(), 4);
    assert!(harness.alerts().await.is_empty());
    assert!(harness.link(1, B).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_send_eventually_succeeds() {
    let harness = Harness::new(config(), hola());
    harness.platform.push_failure(
        B,
        DeliveryError::RateLimited {
            retry_after_secs: 2,
        },
    );

    harness.send(Message::text(1, A, "Hola mundo")).await;

    assert_eq!(harness.platform.calls_to(B).len(), 2);
    assert_eq!(harness.link(1, B), Some(1000));
}

#[tokio::test]
async fn test_voice_gets_translated_transcript_reply() {
    let mut config = config();
    config.transcription.enabled = true;
    config.transcription.language_hint = Some("es".to_string());
    let transcriber = Arc::new(MockTranscriber::new("Hola a todos"));
    let harness = Harness::build(config, hola(), Some(transcriber.clone()));

    let voice = Message::new(
        1,
        A,
        MessageKind::Voice {
            media: MediaRef::new(MediaKind::Audio, "voice-1"),
            caption: None,
        },
    );
    harness.send(voice).await;

    let calls = harness.platform.calls();
    assert!(matches!(&calls[0], PlatformCall::Copy(copy) if copy.message_id == 1));
    assert_eq!(
        calls[1],
        PlatformCall::Download {
            file_id: "voice-1".to_string()
        }
    );
    assert_eq!(
        sent_texts(&harness.platform),
        vec![(
            Destination::new(B, 10),
            "Hello everyone".to_string(),
            Some(1000)
        )]
    );
    assert_eq!(
        transcriber.calls(),
        vec![(b"voice-bytes".to_vec(), Some("es".to_string()))]
    );
}

#[tokio::test]
async fn test_failed_transcription_keeps_voice_copy() {
    let mut config = config();
    config.transcription.enabled = true;
    let harness = Harness::build(config, hola(), Some(Arc::new(MockTranscriber::failing())));

    let voice = Message::new(
        1,
        A,
        MessageKind::Voice {
            media: MediaRef::new(MediaKind::Audio, "voice-1"),
            caption: None,
        },
    );
    harness.send(voice).await;

    assert_eq!(harness.link(1, B), Some(1000));
    assert!(sent_texts(&harness.platform).is_empty());
    assert!(harness.alerts().await.is_empty());
}

#[tokio::test]
async fn test_events_from_a_destination_are_refused() {
    let harness = Harness::new(config(), hola());

    harness
        .send(Message::text(1, B, "Hola mundo").with_thread(10))
        .await;
    harness
        .edit(
            Message::text(1, B, "Hola amigos")
                .with_thread(10)
                .with_edit_date(5),
        )
        .await;

    assert!(harness.platform.calls().is_empty());
    assert!(harness.translator.calls().is_empty());
    assert_eq!(harness.engine.context().links.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_album_caption_edit_targets_caption_carrier() {
    let harness = Harness::new(config(), hola());

    harness
        .send(photo(12, Some("Hola amigos")).with_album("g1"))
        .await;
    harness.send(photo(11, None).with_album("g1")).await;
    sleep(Duration::from_millis(700)).await;

    let calls = harness.platform.calls();
    let PlatformCall::SendAlbum(album) = &calls[0] else {
        panic!("expected an album call, got {calls:?}");
    };
    assert_eq!(album.items[0].media.file_id, "photo-11");
    assert_eq!(album.items[0].caption_html.as_deref(), Some("Hello friends"));
    assert_eq!(harness.link(11, B), Some(1000));
    assert_eq!(harness.link(12, B), Some(1001));

    harness
        .edit(photo(12, Some("Hola mundo")).with_album("g1").with_edit_date(9))
        .await;

    assert_eq!(
        harness.platform.calls().last(),
        Some(&PlatformCall::EditCaption {
            chat: B,
            message_id: 1000,
            html: "Hello world".to_string(),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_large_album_is_chunked_with_one_caption() {
    let harness = Harness::new(config(), hola());

    for id in 1..=11 {
        let caption = (id == 5).then_some("Hola amigos");
        harness.send(photo(id, caption).with_album("big")).await;
    }
    sleep(Duration::from_millis(700)).await;

    let albums: Vec<_> = harness
        .platform
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            PlatformCall::SendAlbum(album) => Some(album),
            _ => None,
        })
        .collect();
    assert_eq!(albums.len(), 2);
    assert_eq!(albums[0].items.len(), 10);
    assert_eq!(albums[1].items.len(), 1);
    assert_eq!(albums[0].items[0].media.file_id, "photo-1");
    assert_eq!(
        albums[0].items[0].caption_html.as_deref(),
        Some("Hello friends")
    );
    let captions = albums
        .iter()
        .flat_map(|album| &album.items)
        .filter(|item| item.caption_html.is_some())
        .count();
    assert_eq!(captions, 1);

    assert_eq!(harness.link(1, B), Some(1000));
    assert_eq!(harness.link(10, B), Some(1009));
    assert_eq!(harness.link(11, B), Some(1010));
}

#[tokio::test(start_paused = true)]
async fn test_album_replies_to_mapped_message() {
    let harness = Harness::new(config(), hola());

    harness.send(Message::text(1, A, "Hola mundo")).await;
    harness
        .send(photo(2, None).with_album("g3").with_reply_to(1))
        .await;
    harness.send(photo(3, None).with_album("g3")).await;
    sleep(Duration::from_millis(700)).await;

    let calls = harness.platform.calls();
    let PlatformCall::SendAlbum(album) = &calls[1] else {
        panic!("expected an album call, got {calls:?}");
    };
    assert_eq!(album.reply_to, Some(1000));
    assert_eq!(album.items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_album_failure_alerts_operator() {
    let harness = Harness::new(config(), hola());
    harness
        .platform
        .always_fail(B, DeliveryError::permanent("Bad Request: wrong file identifier"));

    harness.send(photo(21, None).with_album("g4")).await;
    harness.send(photo(22, None).with_album("g4")).await;
    sleep(Duration::from_millis(700)).await;

    assert_eq!(harness.platform.calls_to(B).len(), 1);
    assert!(harness.link(21, B).is_none());

    let alerts = harness.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].operation, "send_album");
    assert_eq!(alerts[0].source_message_id, 21);
    assert_eq!(alerts[0].dest, Destination::new(B, 10));
}
