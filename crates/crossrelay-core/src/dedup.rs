//! Duplicate and loop suppression.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crossrelay_traits::{ChatId, Destination, MessageId, ThreadId, normalize_thread};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SeenKey {
    Post {
        location: ChatId,
        message_id: MessageId,
    },
    Edit {
        location: ChatId,
        message_id: MessageId,
        revision: i64,
    },
}

/// Time-windowed de-duplication plus destination-loop detection.
pub struct DedupGuard {
    ttl: Duration,
    max_entries: usize,
    seen: Mutex<HashMap<SeenKey, Instant>>,
    destinations: HashSet<Destination>,
}

impl DedupGuard {
    pub fn new(ttl: Duration, max_entries: usize, destinations: HashSet<Destination>) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            seen: Mutex::new(HashMap::new()),
            destinations,
        }
    }

    /// Replace the destination set used for loop detection.
    pub fn with_destinations(mut self, destinations: HashSet<Destination>) -> Self {
        self.destinations = destinations;
        self
    }

    /// Returns true when this post was already seen within the TTL.
    pub fn seen(&self, location: ChatId, message_id: MessageId) -> bool {
        self.check_and_record(SeenKey::Post {
            location,
            message_id,
        })
    }

    /// Like [`seen`](Self::seen) but keyed on the edit revision as well.
    pub fn seen_edit(&self, location: ChatId, message_id: MessageId, revision: i64) -> bool {
        self.check_and_record(SeenKey::Edit {
            location,
            message_id,
            revision,
        })
    }

    /// Whether `location`/`thread` is itself a relay destination.
    pub fn is_destination(&self, location: ChatId, thread: Option<ThreadId>) -> bool {
        self.destinations
            .contains(&Destination::new(location, normalize_thread(thread)))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_and_record(&self, key: SeenKey) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock();

        if let Some(at) = seen.get(&key)
            && now.duration_since(*at) < self.ttl
        {
            debug!(?key, "Duplicate event suppressed");
            return true;
        }

        seen.insert(key, now);
        if seen.len() > self.max_entries {
            self.prune(&mut seen, now);
        }
        false
    }

    fn prune(&self, seen: &mut HashMap<SeenKey, Instant>, now: Instant) {
        let before = seen.len();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);

        if seen.len() > self.max_entries {
            let mut by_age: Vec<(SeenKey, Instant)> =
                seen.iter().map(|(key, at)| (*key, *at)).collect();
            by_age.sort_by_key(|(_, at)| *at);
            let excess = seen.len() - self.max_entries;
            for (key, _) in by_age.into_iter().take(excess) {
                seen.remove(&key);
            }
        }

        debug!(before, after = seen.len(), "Pruned dedup cache");
    }
}
