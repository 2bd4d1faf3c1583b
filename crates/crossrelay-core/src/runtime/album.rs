//! Media group aggregator - coalesces album items into one batched post.
//!
//! Telegram delivers an album as N separate updates sharing a
//! `media_group_id`. Items are buffered per bucket key and flushed once the
//! bucket has been quiet for the debounce window.
//!
//! Every arrival bumps the bucket generation and re-arms a fresh timer task,
//! so a stale timer wakes up, sees a newer generation and does nothing. Items
//! that arrive while a flush is running are parked in the bucket and flushed
//! as a second batch afterwards; two flushes for one key never overlap.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::debug;

use crossrelay_traits::{ChatId, Destination, Message};

/// Bucket identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumKey {
    pub source_chat: ChatId,
    pub album_id: String,
    pub dest: Destination,
    pub translate: bool,
}

/// Receives a flushed batch.
#[async_trait]
pub trait AlbumSink: Send + Sync {
    async fn flush_album(&self, key: &AlbumKey, items: Vec<Message>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketState {
    Collecting,
    Flushing,
}

struct Bucket {
    items: Vec<Message>,
    generation: u64,
    state: BucketState,
    timer: Option<JoinHandle<()>>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
            state: BucketState::Collecting,
            timer: None,
        }
    }
}

struct AggregatorInner {
    debounce: Duration,
    buckets: Mutex<HashMap<AlbumKey, Bucket>>,
    sink: Arc<dyn AlbumSink>,
    idle: Notify,
}

/// Debounced album batching keyed by [`AlbumKey`].
#[derive(Clone)]
pub struct MediaGroupAggregator {
    inner: Arc<AggregatorInner>,
}

impl MediaGroupAggregator {
    pub fn new(debounce: Duration, sink: Arc<dyn AlbumSink>) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                debounce,
                buckets: Mutex::new(HashMap::new()),
                sink,
                idle: Notify::new(),
            }),
        }
    }

    /// Add `item` to its bucket and (re)start the quiet-period timer.
    pub fn handle(&self, key: AlbumKey, item: Message) {
        let mut buckets = self.inner.buckets.lock();
        let bucket = buckets.entry(key.clone()).or_insert_with(Bucket::new);
        bucket.items.push(item);

        if bucket.state == BucketState::Flushing {
            debug!(
                source_chat = key.source_chat,
                album_id = %key.album_id,
                "Album item parked until running flush completes"
            );
            return;
        }

        AggregatorInner::arm(&self.inner, &key, bucket);
    }

    /// Number of live buckets.
    pub fn pending(&self) -> usize {
        self.inner.buckets.lock().len()
    }

    /// Flush every collecting bucket now and wait for all flushes to finish.
    pub async fn drain(&self) {
        let due: Vec<(AlbumKey, u64)> = {
            let mut buckets = self.inner.buckets.lock();
            buckets
                .iter_mut()
                .filter(|(_, bucket)| bucket.state == BucketState::Collecting)
                .map(|(key, bucket)| {
                    bucket.generation += 1;
                    if let Some(timer) = bucket.timer.take() {
                        timer.abort();
                    }
                    (key.clone(), bucket.generation)
                })
                .collect()
        };

        if !due.is_empty() {
            debug!(buckets = due.len(), "Draining album buckets");
        }
        futures::future::join_all(
            due.into_iter()
                .map(|(key, generation)| AggregatorInner::fire(self.inner.clone(), key, generation)),
        )
        .await;

        loop {
            let idle = self.inner.idle.notified();
            if self.inner.buckets.lock().is_empty() {
                break;
            }
            idle.await;
        }
    }
}

impl AggregatorInner {
    fn arm(inner: &Arc<Self>, key: &AlbumKey, bucket: &mut Bucket) {
        bucket.generation += 1;
        let generation = bucket.generation;
        if let Some(timer) = bucket.timer.take() {
            timer.abort();
        }

        let task_inner = inner.clone();
        let task_key = key.clone();
        bucket.timer = Some(tokio::spawn(async move {
            sleep(task_inner.debounce).await;
            Self::fire(task_inner, task_key, generation).await;
        }));
    }

    async fn fire(inner: Arc<Self>, key: AlbumKey, generation: u64) {
        let items = {
            let mut buckets = inner.buckets.lock();
            let Some(bucket) = buckets.get_mut(&key) else {
                return;
            };
            if bucket.generation != generation || bucket.state != BucketState::Collecting {
                return;
            }
            bucket.state = BucketState::Flushing;
            bucket.timer = None;
            std::mem::take(&mut bucket.items)
        };

        debug!(
            source_chat = key.source_chat,
            album_id = %key.album_id,
            dest = %key.dest,
            items = items.len(),
            "Flushing album"
        );
        inner.sink.flush_album(&key, items).await;

        {
            let mut buckets = inner.buckets.lock();
            if let Some(bucket) = buckets.get_mut(&key) {
                if bucket.items.is_empty() {
                    buckets.remove(&key);
                } else {
                    bucket.state = BucketState::Collecting;
                    Self::arm(&inner, &key, bucket);
                }
            }
        }
        inner.idle.notify_waiters();
    }
}
