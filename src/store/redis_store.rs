//! Redis Store Module
//!
//! Store backend delegating each primitive to one command on a single Redis
//! server through a reconnecting `ConnectionManager`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, ErrorKind, RedisError, Script};
use tracing::{debug, info};

use super::{ttl_millis, KeyTtl, Store};
use crate::error::Result;

/// Keys fetched per `SCAN` round trip
const SCAN_COUNT: usize = 500;

/// Upper bound on opening the connection, retries included
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reconnect attempts after the first one fails
const CONNECT_RETRIES: usize = 1;

// Writes every field only when the hash does not exist yet
const HSET_IF_ABSENT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV))
return 1
";

// == Redis Store ==
/// Single-server Redis backend.
///
/// Clones of the underlying connection manager share one multiplexed
/// connection. After [`Store::shutdown`] every call fails with an I/O error.
pub struct RedisStore {
    address: String,
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Opens a connection to `address` (`redis://host:port`) and pings it once.
    ///
    /// Gives up after [`CONNECT_TIMEOUT`] with an I/O error when the server
    /// cannot be reached.
    pub async fn connect(address: &str) -> Result<Self> {
        debug!("Connecting to Redis at {}", address);

        let client = Client::open(address)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(CONNECT_TIMEOUT);

        let mut conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            ConnectionManager::new_with_config(client, config),
        )
        .await
        .map_err(|_| RedisError::from((ErrorKind::IoError, "Timed out connecting to Redis")))??;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Connected to Redis at {}", address);

        Ok(Self {
            address: address.to_string(),
            conn: RwLock::new(Some(conn)),
        })
    }

    /// Address this store was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.conn
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| {
                RedisError::from((ErrorKind::IoError, "Redis store has been shut down")).into()
            })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("GET").arg(key).query_async(&mut conn).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn hset(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in pairs {
            cmd.arg(field).arg(value);
        }
        Ok(cmd.query_async(&mut conn).await?)
    }

    async fn hget(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?)
    }

    async fn hset_if_absent(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<bool> {
        if pairs.is_empty() {
            return Ok(false);
        }
        let mut conn = self.connection()?;
        let script = Script::new(HSET_IF_ABSENT_SCRIPT);
        let mut invocation = script.key(key);
        for (field, value) in pairs {
            invocation.arg(field).arg(value);
        }
        Ok(invocation.invoke_async(&mut conn).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut conn = self.connection()?;
        let hash: HashMap<Vec<u8>, Vec<u8>> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(hash.into_iter().collect())
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<usize> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("RPUSH")
            .arg(key)
            .arg(values)
            .query_async(&mut conn)
            .await?)
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("LINDEX")
            .arg(key)
            .arg(index)
            .query_async(&mut conn)
            .await?)
    }

    async fn lrange(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?)
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<usize> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("SADD")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?)
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?)
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?)
    }

    async fn pttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.connection()?;
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(KeyTtl::from_pttl(millis))
    }

    async fn setbit(&self, key: &str, offset: u64, value: bool) -> Result<bool> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("SETBIT")
            .arg(key)
            .arg(offset)
            .arg(u8::from(value))
            .query_async(&mut conn)
            .await?)
    }

    async fn getbit(&self, key: &str, offset: u64) -> Result<bool> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("GETBIT")
            .arg(key)
            .arg(offset)
            .query_async(&mut conn)
            .await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection()?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let removed: usize = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn shutdown(&self) -> Result<()> {
        if let Ok(mut guard) = self.conn.write() {
            guard.take();
        }
        info!("Redis connection to {} released", self.address);
        Ok(())
    }
}
