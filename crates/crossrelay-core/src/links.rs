//! Reply link store - durable source -> relayed message id mapping.
//!
//! Persistence failures never fail a relay: lookups degrade to "no mapping"
//! and saves degrade to a warning.

use tracing::warn;

use crossrelay_storage::{CaptionLinkStorage, RelayLinkStorage, Storage};
use crossrelay_traits::{ChatId, MessageId};

#[derive(Debug, Clone)]
pub struct ReplyLinkStore {
    storage: RelayLinkStorage,
    captions: CaptionLinkStorage,
}

impl ReplyLinkStore {
    pub fn new(storage: RelayLinkStorage, captions: CaptionLinkStorage) -> Self {
        Self { storage, captions }
    }

    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(storage.relay_links.clone(), storage.caption_links.clone())
    }

    /// Idempotent upsert.
    pub fn save(
        &self,
        source_location: ChatId,
        source_message_id: MessageId,
        dest_location: ChatId,
        dest_message_id: MessageId,
    ) {
        if let Err(e) = self.storage.save_link(
            source_location,
            source_message_id,
            dest_location,
            dest_message_id,
        ) {
            warn!(
                source_chat = source_location,
                message_id = source_message_id,
                dest_chat = dest_location,
                error = %e,
                "Failed to save relay link"
            );
        }
    }

    pub fn lookup(
        &self,
        source_location: ChatId,
        source_message_id: MessageId,
        dest_location: ChatId,
    ) -> Option<MessageId> {
        match self
            .storage
            .get_link(source_location, source_message_id, dest_location)
        {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    source_chat = source_location,
                    message_id = source_message_id,
                    dest_chat = dest_location,
                    error = %e,
                    "Failed to read relay link"
                );
                None
            }
        }
    }

    /// Remove one link; returns whether it existed.
    pub fn remove(
        &self,
        source_location: ChatId,
        source_message_id: MessageId,
        dest_location: ChatId,
    ) -> bool {
        self.storage
            .remove_link(source_location, source_message_id, dest_location)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to remove relay link");
                false
            })
    }

    /// Record which relayed message carries the caption of an album item.
    pub fn save_caption_target(
        &self,
        source_location: ChatId,
        source_message_id: MessageId,
        dest_location: ChatId,
        dest_message_id: MessageId,
    ) {
        if let Err(e) = self.captions.save_caption_link(
            source_location,
            source_message_id,
            dest_location,
            dest_message_id,
        ) {
            warn!(
                source_chat = source_location,
                message_id = source_message_id,
                dest_chat = dest_location,
                error = %e,
                "Failed to save caption link"
            );
        }
    }

    /// Relayed message whose caption mirrors this source message.
    ///
    /// Album items resolve to the item the caption was moved onto; everything
    /// else resolves to its own relayed copy.
    pub fn caption_target(
        &self,
        source_location: ChatId,
        source_message_id: MessageId,
        dest_location: ChatId,
    ) -> Option<MessageId> {
        match self
            .captions
            .get_caption_link(source_location, source_message_id, dest_location)
        {
            Ok(Some(found)) => Some(found),
            Ok(None) => self.lookup(source_location, source_message_id, dest_location),
            Err(e) => {
                warn!(
                    source_chat = source_location,
                    message_id = source_message_id,
                    dest_chat = dest_location,
                    error = %e,
                    "Failed to read caption link"
                );
                self.lookup(source_location, source_message_id, dest_location)
            }
        }
    }

    pub fn count(&self) -> usize {
        self.storage.count().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count relay links");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossrelay_storage::Storage;
    use tempfile::tempdir;

    #[test]
    fn test_links_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("links.db");

        {
            let store = ReplyLinkStore::from_storage(&Storage::new(&db_path).unwrap());
            store.save(-100, 1, -200, 50);
            store.save(-100, 1, -300, 60);
            store.save(-100, 1, -200, 51);
        }

        let store = ReplyLinkStore::from_storage(&Storage::new(&db_path).unwrap());
        assert_eq!(store.lookup(-100, 1, -200), Some(51));
        assert_eq!(store.lookup(-100, 1, -300), Some(60));
        assert_eq!(store.lookup(-100, 2, -200), None);
        assert_eq!(store.count(), 2);

        assert!(store.remove(-100, 1, -300));
        assert_eq!(store.lookup(-100, 1, -300), None);
    }

    #[test]
    fn test_caption_target_prefers_caption_link() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("links.db")).unwrap();
        let store = ReplyLinkStore::from_storage(&storage);

        store.save(-100, 11, -200, 1000);
        store.save(-100, 12, -200, 1001);
        store.save(-100, 20, -200, 1005);
        store.save_caption_target(-100, 12, -200, 1000);

        assert_eq!(store.caption_target(-100, 12, -200), Some(1000));
        assert_eq!(store.caption_target(-100, 20, -200), Some(1005));
        assert_eq!(store.caption_target(-100, 30, -200), None);
        assert_eq!(store.count(), 3);
    }
}
