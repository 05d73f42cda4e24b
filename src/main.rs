//! Redis Facade - typed data access over a Redis store
//!
//! Connects to the configured store, writes and reads back one list, prints
//! it and exits.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redis_facade::bootstrap::run_demo;
use redis_facade::config::Backend;
use redis_facade::{connect, spawn_cleanup_task, Config, Facade, MemoryStore, SharedStore};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the store (plus the expiry sweep for the memory backend)
/// 4. Run the list demo and print the result
/// 5. Release the store handle
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redis_facade=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: address={}, backend={:?}",
        config.address(),
        config.backend
    );

    let (store, sweep) = match config.backend {
        Backend::Memory => {
            let memory = MemoryStore::new();
            let sweep = spawn_cleanup_task(memory.clone(), config.cleanup_interval);
            (Arc::new(memory) as SharedStore, Some(sweep))
        }
        Backend::Redis => (connect(&config).await?, None),
    };

    let facade = Facade::new(store);
    let values = run_demo(&facade).await?;
    println!("{:?}", values);

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    facade.shutdown().await?;

    info!("Shutdown complete");
    Ok(())
}
