//! Redis backend for the remote tier.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{debug, info};

use super::remote::RemoteBackend;
use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Redis-backed remote tier.
///
/// Holds a multiplexed, auto-reconnecting [`ConnectionManager`]. Each call
/// clones the handle out of the lock, so the lock is never held across I/O.
pub struct RedisBackend {
    connection: RwLock<Option<ConnectionManager>>,
    address: String,
}

impl RedisBackend {
    /// Open a connection to the server named in `config`.
    ///
    /// The caller still pings through [`super::remote::RemoteCache::connect`];
    /// this only bounds the initial connect by `connect_timeout`.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let address = config.remote_address();
        let client = redis::Client::open(connection_info(config))?;

        let manager = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                Error::RemoteUnavailable(format!(
                    "connecting to redis at {} timed out after {:?}",
                    address, config.connect_timeout
                ))
            })??;

        info!(address = %address, "connected to redis");

        Ok(Self {
            connection: RwLock::new(Some(manager)),
            address,
        })
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .read()
            .clone()
            .ok_or_else(|| Error::RemoteUnavailable("redis connection closed".to_string()))
    }
}

fn connection_info(config: &CacheConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.database,
            password: config.password.clone(),
            ..Default::default()
        },
    }
}

/// Longest expiry sent to the server. Redis rejects an expiry whose absolute
/// deadline overflows a signed 64-bit millisecond clock.
const MAX_TTL_MILLIS: u64 = i64::MAX as u64 / 2;

/// PSETEX takes whole milliseconds; round sub-millisecond TTLs up so they still land
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_TTL_MILLIS)
}

#[async_trait]
impl RemoteBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let mut conn = self.connection()?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        match value {
            Some(data) => Ok(Bytes::from(data)),
            None => Err(Error::not_found(key)),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.connection()?;

        if ttl.is_zero() {
            // Redis rejects a zero expiry; an already-expired value is an absent one
            conn.del::<_, ()>(key).await?;
            debug!(key = %key, "redis set with zero ttl, key removed");
            return Ok(());
        }

        conn.pset_ex::<_, _, ()>(key, value.as_ref(), ttl_millis(ttl))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection()?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        info!(address = %self.address, "flushed redis database");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.connection.write().take().is_some() {
            info!(address = %self.address, "closed redis connection");
        }
        Ok(())
    }
}
