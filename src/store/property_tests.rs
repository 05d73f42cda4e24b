//! Property-Based Tests for the Memory Store
//!
//! Uses proptest to check that the memory backend keeps the Redis semantics
//! the facade relies on.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use tokio_test::block_on;

use crate::store::{MemoryStore, Store};

// == Strategies ==
/// Generates short binary values
fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..16)
}

/// Generates small batches of values
fn batches_strategy() -> impl Strategy<Value = Vec<Vec<Vec<u8>>>> {
    prop::collection::vec(prop::collection::vec(value_strategy(), 0..8), 1..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Appending in batches reads back as the concatenation of the batches.
    #[test]
    fn prop_list_preserves_insertion_order(batches in batches_strategy()) {
        let store = MemoryStore::new();
        let read = block_on(async {
            for batch in &batches {
                store.rpush("list", batch.clone()).await.unwrap();
            }
            store.lrange("list").await.unwrap()
        });

        let expected: Vec<Vec<u8>> = batches.into_iter().flatten().collect();
        prop_assert_eq!(read, expected);
    }

    // Duplicates collapse and every added member is reported present.
    #[test]
    fn prop_set_collapses_duplicates(batches in batches_strategy()) {
        let store = MemoryStore::new();
        let expected: HashSet<Vec<u8>> = batches.iter().flatten().cloned().collect();

        let (members, all_present) = block_on(async {
            let mut added = 0;
            for batch in &batches {
                added += store.sadd("set", batch.clone()).await.unwrap();
            }
            let mut all_present = true;
            for member in &expected {
                all_present &= store.sismember("set", member).await.unwrap();
            }
            let members = store.smembers("set").await.unwrap();
            assert_eq!(added, expected.len());
            (members, all_present)
        });

        prop_assert!(all_present);
        prop_assert_eq!(members.len(), expected.len());
        prop_assert_eq!(members.into_iter().collect::<HashSet<_>>(), expected);
    }

    // Successive increments return strictly increasing values from the start.
    #[test]
    fn prop_counter_is_monotonic(deltas in prop::collection::vec(1i64..1000, 1..50)) {
        let store = MemoryStore::new();
        let values = block_on(async {
            let mut values = Vec::new();
            for delta in &deltas {
                values.push(store.incr_by("counter", *delta).await.unwrap());
            }
            values
        });

        let mut running = 0;
        for (value, delta) in values.iter().zip(&deltas) {
            running += delta;
            prop_assert_eq!(*value, running);
        }
        prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    // The last write for each field wins.
    #[test]
    fn prop_hash_last_write_wins(
        pairs in prop::collection::vec((value_strategy(), value_strategy()), 1..30)
    ) {
        let store = MemoryStore::new();
        let mut expected = HashMap::new();
        for (field, value) in &pairs {
            expected.insert(field.clone(), value.clone());
        }

        let read = block_on(async {
            for pair in &pairs {
                store.hset("hash", vec![pair.clone()]).await.unwrap();
            }
            let mut read = HashMap::new();
            for field in expected.keys() {
                read.insert(field.clone(), store.hget("hash", field).await.unwrap().unwrap());
            }
            read
        });

        prop_assert_eq!(read, expected);
    }
}
