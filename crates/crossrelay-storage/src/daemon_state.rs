//! Daemon runtime state persistence.
//!
//! Holds small counters that must survive restarts, such as the inbound
//! feed offset.

use crate::i64_codec::decode_i64;
use crate::{SimpleStorage, define_simple_storage};
use anyhow::Result;

define_simple_storage! {
    /// Runtime key-value state.
    pub struct DaemonStateStorage { table: "daemon_state" }
}

impl DaemonStateStorage {
    pub fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put_raw(key, &value.to_le_bytes())
    }

    /// Read an i64 value for key. Returns 0 when key is absent or malformed.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        Ok(self
            .get_raw(key)?
            .and_then(|bytes| decode_i64(&bytes))
            .unwrap_or(0))
    }
}
