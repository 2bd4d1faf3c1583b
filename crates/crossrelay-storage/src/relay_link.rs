//! Relay link storage - byte-level mapping from source messages to relayed copies.
//!
//! Key format is `{source_chat}:{source_message}:{dest_chat}`; the value is the
//! relayed message id as 8 little-endian bytes.

use crate::i64_codec::decode_i64;
use crate::{SimpleStorage, define_simple_storage};
use anyhow::Result;

define_simple_storage! {
    /// Durable source-to-destination message id links.
    pub struct RelayLinkStorage { table: "relay_links" }
}

/// Build the stable key for one (source message, destination chat) pair.
pub fn link_key(source_chat: i64, source_message: i64, dest_chat: i64) -> String {
    format!("{source_chat}:{source_message}:{dest_chat}")
}

impl RelayLinkStorage {
    /// Record a link, overwriting any previous value for the same key.
    pub fn save_link(
        &self,
        source_chat: i64,
        source_message: i64,
        dest_chat: i64,
        dest_message: i64,
    ) -> Result<()> {
        self.put_raw(
            &link_key(source_chat, source_message, dest_chat),
            &dest_message.to_le_bytes(),
        )
    }

    pub fn get_link(
        &self,
        source_chat: i64,
        source_message: i64,
        dest_chat: i64,
    ) -> Result<Option<i64>> {
        let raw = self.get_raw(&link_key(source_chat, source_message, dest_chat))?;
        Ok(match raw {
            Some(bytes) => {
                let decoded = decode_i64(&bytes);
                if decoded.is_none() {
                    tracing::warn!(
                        source_chat,
                        source_message,
                        dest_chat,
                        len = bytes.len(),
                        "Ignoring malformed relay link value"
                    );
                }
                decoded
            }
            None => None,
        })
    }

    pub fn remove_link(&self, source_chat: i64, source_message: i64, dest_chat: i64) -> Result<bool> {
        self.delete(&link_key(source_chat, source_message, dest_chat))
    }
}
