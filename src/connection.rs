//! Connection Module
//!
//! Opens the store backend selected by the configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{Backend, Config};
use crate::error::Result;
use crate::store::{MemoryStore, RedisStore, SharedStore};

/// Opens the configured backend and returns it as a shared handle.
///
/// The Redis backend is pinged once before this returns, so an unreachable
/// server surfaces here as the client's own error.
pub async fn connect(config: &Config) -> Result<SharedStore> {
    match config.backend {
        Backend::Redis => {
            let store = RedisStore::connect(&config.address()).await?;
            Ok(Arc::new(store))
        }
        Backend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
