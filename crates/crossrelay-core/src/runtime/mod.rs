//! Relay runtime: intake, album batching and per-edge delivery.

mod album;
mod engine;
mod relay;

pub use album::{AlbumKey, AlbumSink, MediaGroupAggregator};
pub use engine::{Collaborators, RelayEngine};
pub use relay::{MAX_ALBUM_ITEMS, RelayContext};
