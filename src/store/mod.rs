//! Store Module
//!
//! The primitive operations the facade delegates to, and the backends that
//! implement them.

mod entry;
mod memory;
mod redis_store;

#[cfg(test)]
mod property_tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use entry::{StoreEntry, StoreValue};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Shared, explicitly owned handle to a store backend.
pub type SharedStore = Arc<dyn Store>;

/// Whole milliseconds for a TTL, rounded up to at least 1ms.
///
/// Redis rejects a zero `PX`/`PEXPIRE`, so both backends share this floor.
/// Durations past `u64::MAX` milliseconds saturate.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

// == Key TTL ==
/// Expiration state of a key as reported by the store (`PTTL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist
    Missing,
    /// Key exists without an expiration
    Persistent,
    /// Key expires after the remaining duration
    Expires(Duration),
}

impl KeyTtl {
    /// Maps a raw `PTTL` reply (-2, -1 or milliseconds) to a KeyTtl.
    pub fn from_pttl(millis: i64) -> Self {
        match millis {
            -2 => KeyTtl::Missing,
            m if m < 0 => KeyTtl::Persistent,
            m => KeyTtl::Expires(Duration::from_millis(m as u64)),
        }
    }

    /// Remaining duration, if the key expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(d) => Some(*d),
            _ => None,
        }
    }
}

// == Store Trait ==
/// One method per store primitive used by the facade.
///
/// Values, fields and members are opaque byte strings; the facade owns the
/// encoding. Implementations follow Redis reply semantics for each command.
#[async_trait]
pub trait Store: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `SET key value [PX ttl]`
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// `HSET key field value [field value ...]`, returns the number of new fields
    async fn hset(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize>;

    /// `HGET key field`
    async fn hget(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Atomic `HSET key field value [field value ...]` applied only when `key`
    /// does not exist, returns whether the fields were written
    async fn hset_if_absent(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<bool>;

    /// `HGETALL key`
    async fn hgetall(&self, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// `RPUSH key value [value ...]`, returns the list length
    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<usize>;

    /// `LINDEX key index`
    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>>;

    /// `LRANGE key 0 -1`
    async fn lrange(&self, key: &str) -> Result<Vec<Vec<u8>>>;

    /// `SADD key member [member ...]`, returns the number of new members
    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<usize>;

    /// `SMEMBERS key`
    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>>;

    /// `SISMEMBER key member`
    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool>;

    /// `INCRBY key delta`, returns the value after the increment
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// `PEXPIRE key ttl`, returns false if the key does not exist
    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// `PTTL key`
    async fn pttl(&self, key: &str) -> Result<KeyTtl>;

    /// `SETBIT key offset value`, returns the previous bit
    async fn setbit(&self, key: &str, offset: u64, value: bool) -> Result<bool>;

    /// `GETBIT key offset`
    async fn getbit(&self, key: &str, offset: u64) -> Result<bool>;

    /// Every key matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// `DEL key`, returns whether the key existed
    async fn del(&self, key: &str) -> Result<bool>;

    /// Releases connections held by the backend.
    async fn shutdown(&self) -> Result<()>;
}
