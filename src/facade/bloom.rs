//! Bloom Filter Module
//!
//! Client-side bloom filter over a store bitmap. The filter parameters live in
//! a companion hash `{name}:config` so every client sharing the name agrees on
//! the bit layout.

use std::collections::HashMap;
use std::hash::Hasher;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use siphasher::sip::SipHasher13;
use tracing::debug;

use super::codec;
use crate::error::{FacadeError, Result};
use crate::store::SharedStore;

/// Largest bitmap a single Redis string can hold.
pub const MAX_BLOOM_SIZE: u64 = 1 << 32;

const FIELD_SIZE: &[u8] = b"size";
const FIELD_HASH_ITERATIONS: &[u8] = b"hashIterations";
const FIELD_EXPECTED_INSERTIONS: &[u8] = b"expectedInsertions";
const FIELD_FALSE_PROBABILITY: &[u8] = b"falseProbability";

// Second hash key, distinct from the default (0, 0) keys of the first hash
const SECOND_HASH_KEYS: (u64, u64) = (0x9e37_79b9_7f4a_7c15, 0xc2b2_ae3d_27d4_eb4f);

// == Sizing ==
/// Number of bits for `expected_insertions` elements at `false_probability`.
pub fn optimal_num_of_bits(expected_insertions: u64, false_probability: f64) -> u64 {
    let ln2 = std::f64::consts::LN_2;
    let bits = -(expected_insertions as f64) * false_probability.ln() / (ln2 * ln2);
    (bits as u64).max(1)
}

/// Number of hash functions minimizing the false positive rate for `size` bits.
pub fn optimal_num_of_hash_functions(expected_insertions: u64, size: u64) -> u32 {
    let k = (size as f64 / expected_insertions as f64 * std::f64::consts::LN_2).round();
    (k as u32).max(1)
}

fn validate(expected_insertions: u64, false_probability: f64) -> Result<()> {
    if expected_insertions == 0 {
        return Err(FacadeError::InvalidArgument(
            "Bloom filter expected insertions must be greater than 0".to_string(),
        ));
    }
    if !(false_probability > 0.0 && false_probability < 1.0) {
        return Err(FacadeError::InvalidArgument(format!(
            "Bloom filter false probability must be in (0, 1), got {}",
            false_probability
        )));
    }
    Ok(())
}

// == Bloom Filter ==
/// Handle to a named bloom filter in the store.
pub struct BloomFilter {
    store: SharedStore,
    name: String,
    size: u64,
    hash_iterations: u32,
    expected_insertions: u64,
    false_probability: f64,
    initialized_here: bool,
}

impl BloomFilter {
    /// Initializes the filter unless a configuration already exists, then
    /// applies `ttl` to both the bitmap and its configuration.
    ///
    /// An existing configuration always wins over the requested parameters.
    pub(crate) async fn try_init(
        store: SharedStore,
        name: &str,
        expected_insertions: u64,
        false_probability: f64,
        ttl: Option<Duration>,
    ) -> Result<Self> {
        validate(expected_insertions, false_probability)?;

        let size = optimal_num_of_bits(expected_insertions, false_probability);
        if size > MAX_BLOOM_SIZE {
            return Err(FacadeError::InvalidArgument(format!(
                "Bloom filter size {} exceeds the maximum of {} bits",
                size, MAX_BLOOM_SIZE
            )));
        }
        let hash_iterations = optimal_num_of_hash_functions(expected_insertions, size);
        let config_key = config_key(name);

        // One atomic write: other openers see no config or all of it
        let initialized_here = store
            .hset_if_absent(
                &config_key,
                vec![
                    (FIELD_SIZE.to_vec(), size.to_string().into_bytes()),
                    (
                        FIELD_HASH_ITERATIONS.to_vec(),
                        hash_iterations.to_string().into_bytes(),
                    ),
                    (
                        FIELD_EXPECTED_INSERTIONS.to_vec(),
                        expected_insertions.to_string().into_bytes(),
                    ),
                    (
                        FIELD_FALSE_PROBABILITY.to_vec(),
                        false_probability.to_string().into_bytes(),
                    ),
                ],
            )
            .await?;

        let mut filter = Self {
            store,
            name: name.to_string(),
            size,
            hash_iterations,
            expected_insertions,
            false_probability,
            initialized_here,
        };

        if initialized_here {
            // Materialize the bitmap so the TTL below covers it from the start
            filter.store.setbit(name, size - 1, false).await?;
            debug!(
                "Bloom filter {} initialized: size={}, hash_iterations={}",
                name, size, hash_iterations
            );
        } else {
            filter.load_config(&config_key).await?;
            debug!("Bloom filter {} already initialized, using stored config", name);
        }

        if let Some(ttl) = ttl {
            filter.store.pexpire(name, ttl).await?;
            filter.store.pexpire(&config_key, ttl).await?;
        }

        Ok(filter)
    }

    /// Replaces the requested parameters with those stored under `config_key`.
    ///
    /// Every field must be present and well formed.
    async fn load_config(&mut self, config_key: &str) -> Result<()> {
        let stored: HashMap<Vec<u8>, Vec<u8>> =
            self.store.hgetall(config_key).await?.into_iter().collect();

        self.size = required_field(&stored, config_key, FIELD_SIZE)?;
        self.hash_iterations = required_field(&stored, config_key, FIELD_HASH_ITERATIONS)?;
        self.expected_insertions =
            required_field(&stored, config_key, FIELD_EXPECTED_INSERTIONS)?;
        self.false_probability = required_field(&stored, config_key, FIELD_FALSE_PROBABILITY)?;

        if self.size == 0 || self.hash_iterations == 0 {
            return Err(FacadeError::InvalidArgument(format!(
                "Bloom filter config {} has zero size or hash iterations",
                config_key
            )));
        }
        Ok(())
    }

    // == Add ==
    /// Adds an element, returning true if it was not already (probably) present.
    pub async fn add<T: Serialize + ?Sized>(&self, element: &T) -> Result<bool> {
        let mut changed = false;
        for index in self.indexes(&codec::encode(element)?) {
            let previous = self.store.setbit(&self.name, index, true).await?;
            changed |= !previous;
        }
        Ok(changed)
    }

    // == Contains ==
    /// Returns true if the element may have been added, false if it surely was not.
    pub async fn contains<T: Serialize + ?Sized>(&self, element: &T) -> Result<bool> {
        for index in self.indexes(&codec::encode(element)?) {
            if !self.store.getbit(&self.name, index).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Bit positions for an encoded element, by double hashing.
    fn indexes(&self, bytes: &[u8]) -> Vec<u64> {
        let mut first = SipHasher13::new();
        first.write(bytes);
        let h1 = first.finish();

        let mut second = SipHasher13::new_with_keys(SECOND_HASH_KEYS.0, SECOND_HASH_KEYS.1);
        second.write(bytes);
        let h2 = second.finish();

        (0..u64::from(self.hash_iterations))
            .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % self.size)
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bitmap size in bits.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn hash_iterations(&self) -> u32 {
        self.hash_iterations
    }

    pub fn expected_insertions(&self) -> u64 {
        self.expected_insertions
    }

    pub fn false_probability(&self) -> f64 {
        self.false_probability
    }

    /// Whether this handle wrote the configuration, as opposed to finding one.
    pub fn initialized_here(&self) -> bool {
        self.initialized_here
    }
}

/// Name of the hash holding a filter's parameters.
pub fn config_key(name: &str) -> String {
    format!("{}:config", name)
}

fn required_field<T: FromStr>(
    stored: &HashMap<Vec<u8>, Vec<u8>>,
    config_key: &str,
    field: &[u8],
) -> Result<T> {
    let field_name = String::from_utf8_lossy(field);
    let value = stored.get(field).ok_or_else(|| {
        FacadeError::InvalidArgument(format!(
            "Bloom filter config {} is missing {}",
            config_key, field_name
        ))
    })?;
    std::str::from_utf8(value)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            FacadeError::InvalidArgument(format!(
                "Bloom filter config {} holds an unparsable {}: {:?}",
                config_key,
                field_name,
                String::from_utf8_lossy(value)
            ))
        })
}
