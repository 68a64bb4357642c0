//! Cache Configuration
//!
//! Explicit configuration value consumed by [`crate::cache::CacheManager`].
//! Loadable from YAML (either the bare struct or a `cache:` section of a
//! larger document) or from a `redis://` URL.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default time-to-live for backfilled entries (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default advisory memory budget (100MB)
pub const DEFAULT_MAX_MEMORY: u64 = 100 * 1024 * 1024;

/// Default hard entry cap for the memory tier
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default Redis port
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default remote connect / operation timeout
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Local tier gets this fraction of the memory tier's limits unless set explicitly
pub const LOCAL_TIER_DIVISOR: usize = 10;

/// Which backend serves the remote tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// Local and memory tiers only
    #[default]
    Memory,
    /// Local and memory tiers fronting a Redis server
    Redis,
}

impl fmt::Display for CacheDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheDriver::Memory => write!(f, "memory"),
            CacheDriver::Redis => write!(f, "redis"),
        }
    }
}

impl FromStr for CacheDriver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheDriver::Memory),
            "redis" => Ok(CacheDriver::Redis),
            other => Err(Error::ConfigurationInvalid(format!(
                "unknown cache driver: {}",
                other
            ))),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remote backend selection
    pub driver: CacheDriver,
    /// Remote host
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Remote password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Remote database index
    pub database: i64,
    /// Default TTL, used when promoting values into cheaper tiers
    #[serde(with = "duration_serde")]
    pub ttl: Duration,
    /// Advisory byte budget of the memory tier
    pub max_memory: u64,
    /// Hard entry cap of the memory tier
    pub max_entries: usize,
    /// Hard entry cap of the local tier (defaults to a tenth of `max_entries`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_max_entries: Option<usize>,
    /// Advisory byte budget of the local tier (defaults to a tenth of `max_memory`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_max_memory: Option<u64>,
    /// Startup reachability check timeout
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Timeout applied to every remote call
    #[serde(with = "duration_serde")]
    pub operation_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::Memory,
            host: "localhost".to_string(),
            port: DEFAULT_REDIS_PORT,
            password: None,
            database: 0,
            ttl: DEFAULT_TTL,
            max_memory: DEFAULT_MAX_MEMORY,
            max_entries: DEFAULT_MAX_ENTRIES,
            local_max_entries: None,
            local_max_memory: None,
            connect_timeout: DEFAULT_REMOTE_TIMEOUT,
            operation_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Memory-only configuration with explicit tier caps
    pub fn memory(local_max_entries: usize, max_entries: usize) -> Self {
        Self {
            max_entries,
            local_max_entries: Some(local_max_entries),
            ..Self::default()
        }
    }

    /// Parse a `redis://[:password@]host[:port][/db]` URL into a redis-driver config
    pub fn from_redis_url(url: &str) -> Result<Self> {
        use redis::{ConnectionAddr, IntoConnectionInfo};

        let info = url
            .into_connection_info()
            .map_err(|e| Error::ConfigurationInvalid(format!("invalid redis url: {}", e)))?;

        let (host, port) = match info.addr {
            ConnectionAddr::Tcp(host, port) => (host, port),
            other => {
                return Err(Error::ConfigurationInvalid(format!(
                    "unsupported redis address: {:?}",
                    other
                )))
            }
        };

        let config = Self {
            driver: CacheDriver::Redis,
            host,
            port,
            password: info.redis.password,
            database: info.redis.db,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        let section = match document.get("cache") {
            Some(section) => section.clone(),
            None => document,
        };

        let config: CacheConfig = if section.is_null() {
            CacheConfig::default()
        } else {
            serde_yaml::from_value(section)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Reject configurations the manager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::ConfigurationInvalid(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        if self.local_max_entries == Some(0) {
            return Err(Error::ConfigurationInvalid(
                "local_max_entries must be greater than 0".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(Error::ConfigurationInvalid(
                "default ttl must be greater than 0".to_string(),
            ));
        }

        if self.driver == CacheDriver::Redis {
            if self.host.trim().is_empty() {
                return Err(Error::ConfigurationInvalid(
                    "redis driver requires a host".to_string(),
                ));
            }
            if self.port == 0 {
                return Err(Error::ConfigurationInvalid(
                    "redis driver requires a port".to_string(),
                ));
            }
            if self.database < 0 {
                return Err(Error::ConfigurationInvalid(format!(
                    "invalid redis database index: {}",
                    self.database
                )));
            }
            if self.connect_timeout.is_zero() || self.operation_timeout.is_zero() {
                return Err(Error::ConfigurationInvalid(
                    "remote timeouts must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// True if a remote tier should be constructed
    pub fn is_remote(&self) -> bool {
        self.driver != CacheDriver::Memory
    }

    /// Effective local tier entry cap
    pub fn local_max_entries(&self) -> usize {
        self.local_max_entries
            .unwrap_or(self.max_entries / LOCAL_TIER_DIVISOR)
            .max(1)
    }

    /// Effective local tier byte budget
    pub fn local_max_memory(&self) -> u64 {
        self.local_max_memory
            .unwrap_or(self.max_memory / LOCAL_TIER_DIVISOR as u64)
    }

    /// `host:port/db`, safe to log
    pub fn remote_address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Parse a duration string such as `500ms`, `30s`, `5m`, `1h`, `1d` or `1h30m`.
///
/// A trailing bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            num_buf.push(c);
            continue;
        }

        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        num_buf.clear();

        let unit_ms: u64 = match c {
            'm' | 'M' if matches!(chars.peek(), Some('s') | Some('S')) => {
                chars.next();
                1
            }
            'd' | 'D' => 86_400_000,
            'h' | 'H' => 3_600_000,
            'm' | 'M' => 60_000,
            's' | 'S' => 1_000,
            _ => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit: {}",
                    c
                )))
            }
        };

        total_ms = num
            .checked_mul(unit_ms)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| Error::DurationParse(format!("duration overflows: {}", s)))?;
    }

    if !num_buf.is_empty() {
        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        total_ms = num
            .checked_mul(1_000)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| Error::DurationParse(format!("duration overflows: {}", s)))?;
    }

    Ok(Duration::from_millis(total_ms))
}

/// Render a duration in the shortest unit [`parse_duration`] reads back exactly
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 1000 != 0 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1000;
    if secs == 0 {
        "0s".to_string()
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        match RawDuration::deserialize(d)? {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => {
                super::parse_duration(&text).map_err(serde::de::Error::custom)
            }
        }
    }
}
