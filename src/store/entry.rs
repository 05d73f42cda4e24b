//! Store Entry Module
//!
//! Defines the structure for individual in-memory store entries with TTL support.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::ttl_millis;

// == Store Value ==
/// The Redis value types the memory backend can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    /// String value, also used for counters and bitmaps
    Str(Vec<u8>),
    /// Field to value hash
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    /// Ordered list
    List(Vec<Vec<u8>>),
    /// Unordered set of members
    Set(HashSet<Vec<u8>>),
}

// == Store Entry ==
/// Represents a single stored value with expiration metadata.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored value
    pub value: StoreValue,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoreEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Optional time to live
    pub fn new(value: StoreValue, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(expiry_from_now),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches the expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Expire ==
    /// Sets the expiration to `ttl` from now, replacing any previous one.
    pub fn expire_in(&mut self, ttl: Duration) {
        self.expires_at = Some(expiry_from_now(ttl));
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }
}

// == Utility Functions ==
fn expiry_from_now(ttl: Duration) -> u64 {
    current_timestamp_ms().saturating_add(ttl_millis(ttl))
}

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
