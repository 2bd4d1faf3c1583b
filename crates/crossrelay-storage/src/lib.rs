//! CrossRelay Storage - Low-level persistence layer
//!
//! Uses redb as the embedded database with one byte-level table per concern.
//! Typed wrappers with relay semantics live in crossrelay-core.
//!
//! # Tables
//!
//! - `relay_links` - Source message to relayed copy ids
//! - `caption_links` - Album item to the relayed item carrying the caption
//! - `daemon_state` - Runtime counters such as the inbound feed offset

pub mod caption_link;
pub mod daemon_state;
pub mod relay_link;
pub mod simple_storage;

mod i64_codec;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use caption_link::CaptionLinkStorage;
pub use daemon_state::DaemonStateStorage;
pub use relay_link::{RelayLinkStorage, link_key};
pub use simple_storage::SimpleStorage;

/// Central storage manager that initializes all storage subsystems
pub struct Storage {
    pub relay_links: RelayLinkStorage,
    pub caption_links: CaptionLinkStorage,
    pub daemon_state: DaemonStateStorage,
}

impl Storage {
    /// Open (or create) the database at `path` and initialize every table.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Arc::new(Database::create(path)?);
        let relay_links = RelayLinkStorage::new(db.clone())?;
        let caption_links = CaptionLinkStorage::new(db.clone())?;
        let daemon_state = DaemonStateStorage::new(db)?;

        tracing::debug!(path = %path.display(), "Storage opened");

        Ok(Self {
            relay_links,
            caption_links,
            daemon_state,
        })
    }
}
