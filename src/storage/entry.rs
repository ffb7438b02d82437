//! Entries yielded by cursors and bulk reads

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::Key;

/// A record as seen through a scan.
///
/// `key` is the key the scan is ordered by: the index key for index scans,
/// the primary key for store scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Key,
    pub primary_key: Key,
    pub value: Value,
}

impl Entry {
    /// Entry for a primary store scan, where both keys coincide
    pub fn primary(primary_key: Key, value: Value) -> Self {
        Self {
            key: primary_key.clone(),
            primary_key,
            value,
        }
    }

    /// Entry for an index scan
    pub fn indexed(key: Key, primary_key: Key, value: Value) -> Self {
        Self {
            key,
            primary_key,
            value,
        }
    }

    /// Look up a top-level field of the value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }
}
