//! Redis Facade - typed data access over a Redis store
//!
//! Exposes buckets, maps, lists, sets, bloom filters and atomic counters with
//! optional expiration, each delegating to one store operation.

pub mod bootstrap;
pub mod config;
pub mod connection;
pub mod error;
pub mod facade;
pub mod store;
pub mod tasks;

pub use config::Config;
pub use connection::connect;
pub use error::{FacadeError, Result};
pub use facade::{BloomFilter, Facade};
pub use store::{KeyTtl, MemoryStore, RedisStore, SharedStore, Store};
pub use tasks::spawn_cleanup_task;
