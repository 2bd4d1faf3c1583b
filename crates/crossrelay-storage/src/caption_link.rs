//! Caption link storage - where an album's caption actually landed.
//!
//! Album captions are moved onto the first relayed item, so a caption edit on
//! any source item must target that item rather than its own copy. Keys share
//! the `relay_links` format.

use crate::i64_codec::decode_i64;
use crate::relay_link::link_key;
use crate::{SimpleStorage, define_simple_storage};
use anyhow::Result;

define_simple_storage! {
    /// Source album item to the relayed message carrying the album caption.
    pub struct CaptionLinkStorage { table: "caption_links" }
}

impl CaptionLinkStorage {
    pub fn save_caption_link(
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

    pub fn get_caption_link(
        &self,
        source_chat: i64,
        source_message: i64,
        dest_chat: i64,
    ) -> Result<Option<i64>> {
        Ok(self
            .get_raw(&link_key(source_chat, source_message, dest_chat))?
            .and_then(|bytes| decode_i64(&bytes)))
    }
}
