//! tiercache CLI
//!
//! Runs one cache operation against a three-tier cache and exits.
//!
//! ```text
//! tiercache --redis-url redis://localhost:6379/0 set user:42 alice --ttl 5m
//! tiercache --redis-url redis://localhost:6379/0 get user:42
//! tiercache --config cache.yaml stats
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiercache::config::{format_duration, parse_duration};
use tiercache::{CacheConfig, CacheDriver, CacheManager};

// =============================================================================
// CLI Arguments
// =============================================================================

/// tiercache - local, memory and Redis tiers behind one cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file (bare config or a `cache:` section)
    #[arg(long, env = "TIERCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Redis URL; selects the redis driver
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Cache driver (memory, redis)
    #[arg(long, env = "CACHE_DRIVER", value_parser = parse_driver)]
    driver: Option<CacheDriver>,

    /// Default TTL (e.g. 30s, 5m, 1h)
    #[arg(long, env = "CACHE_TTL", value_parser = parse_ttl)]
    ttl: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value stored under a key
    Get { key: String },

    /// Store a value in every tier
    Set {
        key: String,
        value: String,
        /// Entry TTL; defaults to the configured TTL
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<Duration>,
    },

    /// Remove a key from every tier
    Delete { key: String },

    /// Remove every key from every tier
    Clear,

    /// Check the remote tier is reachable
    Ping,

    /// Print tier occupancy and Prometheus metrics
    Stats,
}

fn parse_ttl(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn parse_driver(s: &str) -> Result<CacheDriver, String> {
    s.parse::<CacheDriver>().map_err(|e| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let config = build_config(&args)?;
    info!(
        driver = %config.driver,
        ttl = %format_duration(config.ttl),
        max_entries = config.max_entries,
        "starting tiercache"
    );

    let manager = CacheManager::new(config)
        .await
        .context("failed to construct cache manager")?;

    let result = run_command(&manager, &args.command).await;

    manager.close().await.context("failed to close cache manager")?;
    result
}

/// File, then REDIS_URL, then explicit flags. The result is validated.
fn build_config(args: &Args) -> anyhow::Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CacheConfig::default(),
    };

    if let Some(url) = &args.redis_url {
        let remote = CacheConfig::from_redis_url(url).context("invalid REDIS_URL")?;
        config.driver = remote.driver;
        config.host = remote.host;
        config.port = remote.port;
        config.password = remote.password;
        config.database = remote.database;
    }

    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if let Some(ttl) = args.ttl {
        config.ttl = ttl;
    }

    config.validate()?;
    debug!(driver = ?config.driver, remote = %config.remote_address(), "configuration resolved");
    Ok(config)
}

async fn run_command(manager: &CacheManager, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Get { key } => {
            let value = manager.get(key).await?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Command::Set { key, value, ttl } => {
            let ttl = ttl.unwrap_or(manager.config().ttl);
            manager.set(key, value.clone(), ttl).await?;
            println!("OK");
        }
        Command::Delete { key } => {
            manager.delete(key).await?;
            println!("OK");
        }
        Command::Clear => {
            manager.clear().await?;
            println!("OK");
        }
        Command::Ping => {
            manager.ping().await?;
            if manager.is_remote_enabled() {
                println!("PONG");
            } else {
                println!("PONG (no remote tier)");
            }
        }
        Command::Stats => {
            let snapshot = manager.metrics();
            println!(
                "local:  {} entries, {} bytes, {} evictions",
                snapshot.local_entries, snapshot.local_size_bytes, snapshot.local_evictions
            );
            println!(
                "memory: {} entries, {} bytes, {} evictions",
                snapshot.memory_entries, snapshot.memory_size_bytes, snapshot.memory_evictions
            );
            println!(
                "remote: {}",
                manager.remote().map(|r| r.name()).unwrap_or("disabled")
            );
            println!();
            print!("{}", manager.metrics_text()?);
        }
    }
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "redis=warn".parse() {
        filter = filter.add_directive(directive);
    }

    // Logs go to stderr so command output stays pipeable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
