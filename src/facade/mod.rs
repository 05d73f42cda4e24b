//! Facade Module
//!
//! Typed passthrough operations over the store. Each call names a structure,
//! performs one store operation on it and optionally applies a TTL. Store
//! errors are returned unchanged.

mod bloom;
pub mod codec;

use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::{KeyTtl, SharedStore};

pub use bloom::{
    config_key as bloom_config_key, optimal_num_of_bits, optimal_num_of_hash_functions,
    BloomFilter, MAX_BLOOM_SIZE,
};

// == Facade ==
/// Data-access facade over a shared store handle.
#[derive(Clone)]
pub struct Facade {
    store: SharedStore,
}

impl Facade {
    /// Creates a facade over an already connected store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    async fn expire(&self, name: &str, ttl: Option<Duration>) -> Result<()> {
        if let Some(ttl) = ttl {
            self.store.pexpire(name, ttl).await?;
        }
        Ok(())
    }

    // == Buckets ==

    /// Stores a single value under `key`, replacing any previous value.
    pub async fn set_bucket<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        debug!("Setting bucket {}", key);
        self.store.set(key, codec::encode(value)?, None).await
    }

    /// Stores a single value under `key` that expires after `ttl`.
    pub async fn set_bucket_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        debug!("Setting bucket {} with ttl {:?}", key, ttl);
        self.store.set(key, codec::encode(value)?, Some(ttl)).await
    }

    /// Reads the value under `key` as `T`.
    ///
    /// Returns `None` if the key does not exist and
    /// [`FacadeError::TypeMismatch`](crate::error::FacadeError::TypeMismatch)
    /// if the stored value is not a `T`.
    pub async fn get_bucket<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.store
            .get(key)
            .await?
            .map(|bytes| codec::decode(key, &bytes))
            .transpose()
    }

    // == Maps ==

    /// Writes every pair into the map `name`.
    pub async fn add_map<K, V, I>(&self, name: &str, values: I) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all(name, values, None).await
    }

    /// Writes every pair into the map `name`, then expires the whole map after `ttl`.
    pub async fn add_map_with_ttl<K, V, I>(&self, name: &str, values: I, ttl: Duration) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all(name, values, Some(ttl)).await
    }

    async fn put_all<K, V, I>(&self, name: &str, values: I, ttl: Option<Duration>) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs = values
            .into_iter()
            .map(|(k, v)| -> Result<(Vec<u8>, Vec<u8>)> {
                Ok((codec::encode(&k)?, codec::encode(&v)?))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Adding {} entries to map {}", pairs.len(), name);
        if !pairs.is_empty() {
            self.store.hset(name, pairs).await?;
        }
        self.expire(name, ttl).await
    }

    /// Reads the value stored for `key` in the map `name`.
    pub async fn get_map_value<K, V>(&self, name: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.store
            .hget(name, &codec::encode(key)?)
            .await?
            .map(|bytes| codec::decode(name, &bytes))
            .transpose()
    }

    // == Keys ==

    /// Every key currently in the store.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.store.keys("*").await
    }

    // == Lists ==

    /// Appends every value to the list `name`, in order.
    pub async fn add_list<T, I>(&self, name: &str, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.push_all(name, values, None).await
    }

    /// Appends every value to the list `name`, then expires the list after `ttl`.
    pub async fn add_list_with_ttl<T, I>(&self, name: &str, values: I, ttl: Duration) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.push_all(name, values, Some(ttl)).await
    }

    async fn push_all<T, I>(&self, name: &str, values: I, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let values = codec::encode_all(values)?;
        debug!("Appending {} values to list {}", values.len(), name);
        if !values.is_empty() {
            self.store.rpush(name, values).await?;
        }
        self.expire(name, ttl).await
    }

    /// Reads the element at `index`; negative indexes count from the tail.
    pub async fn get_list_by_index<T: DeserializeOwned>(
        &self,
        name: &str,
        index: i64,
    ) -> Result<Option<T>> {
        self.store
            .lindex(name, index)
            .await?
            .map(|bytes| codec::decode(name, &bytes))
            .transpose()
    }

    /// Reads the whole list `name`, in insertion order.
    pub async fn get_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        self.store
            .lrange(name)
            .await?
            .iter()
            .map(|bytes| codec::decode(name, bytes))
            .collect()
    }

    // == Sets ==

    /// Adds every value to the set `name`.
    pub async fn add_set<T, I>(&self, name: &str, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.add_members(name, values, None).await
    }

    /// Adds every value to the set `name`, then expires the set after `ttl`.
    pub async fn add_set_with_ttl<T, I>(&self, name: &str, values: I, ttl: Duration) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.add_members(name, values, Some(ttl)).await
    }

    async fn add_members<T, I>(&self, name: &str, values: I, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let members = codec::encode_all(values)?;
        debug!("Adding {} members to set {}", members.len(), name);
        if !members.is_empty() {
            self.store.sadd(name, members).await?;
        }
        self.expire(name, ttl).await
    }

    /// Reads every member of the set `name`.
    pub async fn get_set<T>(&self, name: &str) -> Result<HashSet<T>>
    where
        T: DeserializeOwned + Eq + Hash,
    {
        self.store
            .smembers(name)
            .await?
            .iter()
            .map(|bytes| codec::decode(name, bytes))
            .collect()
    }

    /// Returns true if `value` is a member of the set `name`.
    pub async fn set_contains<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<bool> {
        self.store.sismember(name, &codec::encode(value)?).await
    }

    // == Sorted Sets ==
    //
    // These use the plain set primitive: no score is stored and reads come
    // back unordered, matching the behavior this facade has always had.

    /// Adds every value to `name` as a plain set. No ordering is applied.
    pub async fn add_sorted_set<T, I>(&self, name: &str, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.add_members(name, values, None).await
    }

    /// Adds every value to `name` as a plain set, then expires it after `ttl`.
    pub async fn add_sorted_set_with_ttl<T, I>(
        &self,
        name: &str,
        values: I,
        ttl: Duration,
    ) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.add_members(name, values, Some(ttl)).await
    }

    /// Reads `name` as a plain, unordered set.
    pub async fn get_sorted_set<T>(&self, name: &str) -> Result<HashSet<T>>
    where
        T: DeserializeOwned + Eq + Hash,
    {
        self.get_set(name).await
    }

    // == Bloom Filters ==

    /// Opens the bloom filter `name`, initializing it for `expected_insertions`
    /// at `false_probability` unless it already exists.
    pub async fn bloom_filter(
        &self,
        name: &str,
        expected_insertions: u64,
        false_probability: f64,
    ) -> Result<BloomFilter> {
        BloomFilter::try_init(
            self.store.clone(),
            name,
            expected_insertions,
            false_probability,
            None,
        )
        .await
    }

    /// Same as [`Facade::bloom_filter`], then expires the filter after `ttl`.
    pub async fn bloom_filter_with_ttl(
        &self,
        name: &str,
        expected_insertions: u64,
        false_probability: f64,
        ttl: Duration,
    ) -> Result<BloomFilter> {
        BloomFilter::try_init(
            self.store.clone(),
            name,
            expected_insertions,
            false_probability,
            Some(ttl),
        )
        .await
    }

    // == Atomic Counters ==

    /// Atomically increments the counter `key`, returning its previous value.
    ///
    /// An unset counter starts at 0.
    pub async fn get_and_increment(&self, key: &str) -> Result<i64> {
        Ok(self.store.incr_by(key, 1).await? - 1)
    }

    /// Same as [`Facade::get_and_increment`], then expires the counter after `ttl`.
    pub async fn get_and_increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64> {
        let previous = self.get_and_increment(key).await?;
        self.store.pexpire(key, ttl).await?;
        Ok(previous)
    }

    // == Key Management ==

    /// Expiration state of `name`.
    pub async fn ttl(&self, name: &str) -> Result<KeyTtl> {
        self.store.pttl(name).await
    }

    /// Deletes `name`, returning whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        self.store.del(name).await
    }

    // == Shutdown ==

    /// Releases the store handle.
    pub async fn shutdown(self) -> Result<()> {
        self.store.shutdown().await?;
        info!("Facade shut down");
        Ok(())
    }
}
