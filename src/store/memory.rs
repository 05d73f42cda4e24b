//! Memory Store Module
//!
//! In-process store backend with Redis reply semantics for the primitives the
//! facade uses. Expired entries are dropped lazily on access and by the
//! background sweep task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{KeyTtl, Store, StoreEntry, StoreValue};
use crate::error::{FacadeError, Result};

/// Largest bit offset accepted by `SETBIT` (512 MB strings).
const MAX_BIT_OFFSET: u64 = (1 << 32) - 1;

type Entries = HashMap<String, StoreEntry>;

// == Memory Store ==
/// Thread-safe in-memory store, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Key to entry storage
    entries: Arc<RwLock<Entries>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    // == Length ==
    /// Returns the number of entries held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if no entries are held.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// == Entry Helpers ==
/// Returns the live entry for `key`, dropping it first if it has expired.
fn live<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a mut StoreEntry> {
    if entries.get(key).is_some_and(StoreEntry::is_expired) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

/// Returns the live entry for `key`, creating it from `init` when absent.
fn live_or_insert<'a>(
    entries: &'a mut Entries,
    key: &str,
    init: impl FnOnce() -> StoreValue,
) -> &'a mut StoreEntry {
    if entries.get(key).is_some_and(StoreEntry::is_expired) {
        entries.remove(key);
    }
    entries
        .entry(key.to_string())
        .or_insert_with(|| StoreEntry::new(init(), None))
}

fn wrong_type(key: &str) -> FacadeError {
    FacadeError::WrongType(key.to_string())
}

fn bit_position(offset: u64) -> Result<(usize, u8)> {
    if offset > MAX_BIT_OFFSET {
        return Err(FacadeError::InvalidArgument(
            "bit offset is not an integer or out of range".to_string(),
        ));
    }
    Ok(((offset / 8) as usize, 7 - (offset % 8) as u8))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(StoreValue::Str(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoreEntry::new(StoreValue::Str(value), ttl));
        Ok(())
    }

    async fn hset(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut entries = self.entries.write().await;
        let entry = live_or_insert(&mut entries, key, || StoreValue::Hash(HashMap::new()));
        match &mut entry.value {
            StoreValue::Hash(hash) => Ok(pairs
                .into_iter()
                .map(|(field, value)| hash.insert(field, value).is_none())
                .filter(|added| *added)
                .count()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn hget(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(StoreValue::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hset_if_absent(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<bool> {
        if pairs.is_empty() {
            return Ok(false);
        }
        let mut entries = self.entries.write().await;
        if live(&mut entries, key).is_some() {
            return Ok(false);
        }
        let hash = pairs.into_iter().collect();
        entries.insert(key.to_string(), StoreEntry::new(StoreValue::Hash(hash), None));
        Ok(true)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(StoreValue::Hash(hash)) => Ok(hash
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let mut entries = self.entries.write().await;
        let entry = live_or_insert(&mut entries, key, || StoreValue::List(Vec::new()));
        match &mut entry.value {
            StoreValue::List(list) => {
                list.extend(values);
                Ok(list.len())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(StoreValue::List(list)) => {
                let len = list.len() as i64;
                let idx = if index < 0 { len + index } else { index };
                if idx < 0 || idx >= len {
                    Ok(None)
                } else {
                    Ok(Some(list[idx as usize].clone()))
                }
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn lrange(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(StoreValue::List(list)) => Ok(list.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut entries = self.entries.write().await;
        let entry = live_or_insert(&mut entries, key, || StoreValue::Set(HashSet::new()));
        match &mut entry.value {
            StoreValue::Set(set) => Ok(members
                .into_iter()
                .map(|member| set.insert(member))
                .filter(|added| *added)
                .count()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(StoreValue::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(false),
            Some(StoreValue::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.write().await;
        let entry = live_or_insert(&mut entries, key, || StoreValue::Str(b"0".to_vec()));
        match &mut entry.value {
            StoreValue::Str(bytes) => {
                let current = std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| FacadeError::NotAnInteger(key.to_string()))?;
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| FacadeError::NotAnInteger(key.to_string()))?;
                *bytes = next.to_string().into_bytes();
                Ok(next)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key) {
            Some(entry) => {
                entry.expire_in(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pttl(&self, key: &str) -> Result<KeyTtl> {
        let mut entries = self.entries.write().await;
        Ok(match live(&mut entries, key) {
            None => KeyTtl::Missing,
            Some(entry) => match entry.ttl_remaining_ms() {
                None => KeyTtl::Persistent,
                Some(ms) => KeyTtl::Expires(Duration::from_millis(ms)),
            },
        })
    }

    async fn setbit(&self, key: &str, offset: u64, value: bool) -> Result<bool> {
        let (byte, shift) = bit_position(offset)?;
        let mut entries = self.entries.write().await;
        let entry = live_or_insert(&mut entries, key, || StoreValue::Str(Vec::new()));
        match &mut entry.value {
            StoreValue::Str(bytes) => {
                if bytes.len() <= byte {
                    bytes.resize(byte + 1, 0);
                }
                let previous = (bytes[byte] >> shift) & 1 == 1;
                if value {
                    bytes[byte] |= 1 << shift;
                } else {
                    bytes[byte] &= !(1 << shift);
                }
                Ok(previous)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn getbit(&self, key: &str, offset: u64) -> Result<bool> {
        let (byte, shift) = bit_position(offset)?;
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(false),
            Some(StoreValue::Str(bytes)) => {
                Ok(bytes.get(byte).is_some_and(|b| (b >> shift) & 1 == 1))
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(live(&mut entries, key).is_some() && entries.remove(key).is_some())
    }

    async fn shutdown(&self) -> Result<()> {
        debug!("Memory store released");
        Ok(())
    }
}

// == Glob Matching ==
/// Matches `text` against a glob pattern supporting `*` and `?`.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == b'*')
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = MemoryStore::new();

        store.set("key1", b"value1".to_vec(), None).await.unwrap();
        let value = store.get("key1").await.unwrap();

        assert_eq!(value, Some(b"value1".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_overwrite_clears_ttl() {
        let store = MemoryStore::new();

        store
            .set("key1", b"value1".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store.set("key1", b"value2".to_vec(), None).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some(b"value2".to_vec()));
        assert_eq!(store.pttl("key1").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = MemoryStore::new();

        store
            .set("key1", b"value1".to_vec(), Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("key1").await.unwrap(), None);
        assert_eq!(store.pttl("key1").await.unwrap(), KeyTtl::Missing);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_wrong_type_errors() {
        let store = MemoryStore::new();
        store.rpush("list", vec![b"a".to_vec()]).await.unwrap();

        assert!(matches!(store.get("list").await, Err(FacadeError::WrongType(_))));
        assert!(matches!(
            store.sadd("list", vec![b"a".to_vec()]).await,
            Err(FacadeError::WrongType(_))
        ));
        assert!(matches!(
            store.incr_by("list", 1).await,
            Err(FacadeError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_writes_do_not_create_keys() {
        let store = MemoryStore::new();

        assert_eq!(store.rpush("l", Vec::new()).await.unwrap(), 0);
        assert_eq!(store.sadd("s", Vec::new()).await.unwrap(), 0);
        assert_eq!(store.hset("h", Vec::new()).await.unwrap(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_hash_operations() {
        let store = MemoryStore::new();
        let added = store
            .hset(
                "h",
                vec![
                    (b"a".to_vec(), b"1".to_vec()),
                    (b"b".to_vec(), b"2".to_vec()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(added, 2);

        // Overwriting an existing field is not counted
        let added = store
            .hset("h", vec![(b"a".to_vec(), b"3".to_vec())])
            .await
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(store.hget("h", b"a").await.unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.hget("h", b"z").await.unwrap(), None);

        assert_eq!(store.hgetall("h").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hset_if_absent_writes_all_or_nothing() {
        let store = MemoryStore::new();
        let pairs = vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
        ];
        assert!(store.hset_if_absent("h", pairs).await.unwrap());
        assert_eq!(store.hgetall("h").await.unwrap().len(), 2);

        // Any existing hash, even one missing the new fields, is left alone
        assert!(!store
            .hset_if_absent("h", vec![(b"c".to_vec(), b"3".to_vec())])
            .await
            .unwrap());
        assert_eq!(store.hget("h", b"c").await.unwrap(), None);
        assert_eq!(store.hget("h", b"a").await.unwrap(), Some(b"1".to_vec()));

        // An expired hash counts as absent
        store.pexpire("h", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store
            .hset_if_absent("h", vec![(b"c".to_vec(), b"3".to_vec())])
            .await
            .unwrap());
        assert_eq!(store.hgetall("h").await.unwrap().len(), 1);

        assert!(!store.hset_if_absent("empty", Vec::new()).await.unwrap());
        assert_eq!(store.get("empty").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lindex_negative_and_out_of_range() {
        let store = MemoryStore::new();
        store
            .rpush("l", vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .await
            .unwrap();

        assert_eq!(store.lindex("l", 0).await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.lindex("l", -1).await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(store.lindex("l", 3).await.unwrap(), None);
        assert_eq!(store.lindex("l", -4).await.unwrap(), None);
        assert_eq!(store.lindex("missing", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_by() {
        let store = MemoryStore::new();

        assert_eq!(store.incr_by("c", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("c", 5).await.unwrap(), 6);
        assert_eq!(store.get("c").await.unwrap(), Some(b"6".to_vec()));

        store.set("text", b"abc".to_vec(), None).await.unwrap();
        assert!(matches!(
            store.incr_by("text", 1).await,
            Err(FacadeError::NotAnInteger(_))
        ));

        store.set("max", i64::MAX.to_string().into_bytes(), None).await.unwrap();
        assert!(matches!(
            store.incr_by("max", 1).await,
            Err(FacadeError::NotAnInteger(_))
        ));
    }

    #[tokio::test]
    async fn test_incr_keeps_ttl() {
        let store = MemoryStore::new();
        store.incr_by("c", 1).await.unwrap();
        store.pexpire("c", Duration::from_secs(60)).await.unwrap();
        store.incr_by("c", 1).await.unwrap();

        assert!(matches!(store.pttl("c").await.unwrap(), KeyTtl::Expires(_)));
    }

    #[tokio::test]
    async fn test_pexpire_missing_key() {
        let store = MemoryStore::new();
        assert!(!store.pexpire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_bits_are_msb_first() {
        let store = MemoryStore::new();

        assert!(!store.setbit("bits", 1, true).await.unwrap());
        assert!(store.setbit("bits", 1, true).await.unwrap());
        assert_eq!(store.get("bits").await.unwrap(), Some(vec![0b0100_0000]));

        assert!(store.getbit("bits", 1).await.unwrap());
        assert!(!store.getbit("bits", 0).await.unwrap());
        assert!(!store.getbit("bits", 1000).await.unwrap());

        store.setbit("bits", 15, false).await.unwrap();
        assert_eq!(store.get("bits").await.unwrap().unwrap().len(), 2);

        assert!(matches!(
            store.setbit("bits", 1 << 32, true).await,
            Err(FacadeError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_keys_and_del() {
        let store = MemoryStore::new();
        store.set("user:1", b"a".to_vec(), None).await.unwrap();
        store.set("user:2", b"b".to_vec(), None).await.unwrap();
        store.set("order:1", b"c".to_vec(), None).await.unwrap();

        let mut keys = store.keys("user:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["user:1", "user:2"]);
        assert_eq!(store.keys("*").await.unwrap().len(), 3);

        assert!(store.del("user:1").await.unwrap());
        assert!(!store.del("user:1").await.unwrap());
        assert_eq!(store.keys("*").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemoryStore::new();
        store
            .set("short", b"v".to_vec(), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        store
            .set("long", b"v".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("user:*", "user:42"));
        assert!(!glob_match("user:*", "order:42"));
        assert!(glob_match("h?llo", "hello"));
        assert!(!glob_match("h?llo", "heello"));
        assert!(glob_match("*:config", "filter__x:config"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
    }
}
