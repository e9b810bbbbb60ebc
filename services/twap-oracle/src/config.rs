//! Process configuration
//!
//! Flags fall back to environment variables (a `.env` file is loaded first
//! by `main`). `OracleConfig::from_args` is the only place invalid values
//! are rejected; nothing downstream re-validates per tick.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use oracle_types::errors::ConfigError;
use oracle_types::ids::IntervalWidth;
use url::Url;

use crate::feed::{FeedConfig, ReconnectPolicy};

#[derive(Debug, Clone, Parser)]
#[command(name = "twap-oracle")]
#[command(about = "Grid-interval TWAP settlement oracle with live price and settlement feeds")]
pub struct Args {
    /// Interface to bind the HTTP/WS server on
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// HTTP/WS server port
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Price sampling and broadcast period in milliseconds
    #[arg(long, env = "PRICE_BROADCAST_INTERVAL_MS", default_value = "300")]
    pub price_broadcast_interval_ms: u64,

    /// Settlement grid interval width in seconds
    #[arg(long, env = "GRID_INTERVAL_SECONDS", default_value = "5", allow_negative_numbers = true)]
    pub grid_interval_seconds: i64,

    /// Upstream WebSocket endpoint
    #[arg(long, env = "HYPERLIQUID_WS_URL", default_value = "wss://api.hyperliquid.xyz/ws")]
    pub upstream_url: String,

    /// Asset symbol to read from the upstream mids
    #[arg(long, env = "PRICE_COIN", default_value = "HYPE")]
    pub coin: String,

    /// Buckets and settled values older than this many seconds are evicted
    #[arg(long, env = "RETENTION_HORIZON_SECONDS", default_value = "3600", allow_negative_numbers = true)]
    pub retention_horizon_seconds: i64,

    /// How often the retention sweep runs, in seconds
    #[arg(long, env = "RETENTION_SWEEP_SECONDS", default_value = "3600")]
    pub retention_sweep_seconds: u64,

    /// Consecutive failed upstream connects before giving up
    #[arg(long, env = "MAX_RECONNECT_ATTEMPTS", default_value = "10")]
    pub max_reconnect_attempts: u32,

    /// Delay between upstream reconnect attempts in milliseconds
    #[arg(long, env = "RECONNECT_DELAY_MS", default_value = "5000")]
    pub reconnect_delay_ms: u64,

    /// Upstream connect timeout in milliseconds
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value = "10000")]
    pub connect_timeout_ms: u64,
}

/// Validated configuration for the whole process.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub bind_addr: SocketAddr,
    pub grid_width: IntervalWidth,
    pub sample_period: Duration,
    pub retention_horizon_seconds: i64,
    pub retention_sweep: Duration,
    pub feed: FeedConfig,
}

impl OracleConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let grid_width = IntervalWidth::from_secs(args.grid_interval_seconds)?;

        if args.price_broadcast_interval_ms == 0 {
            return Err(ConfigError::InvalidSamplePeriod {
                millis: args.price_broadcast_interval_ms,
            });
        }
        if args.retention_horizon_seconds < 0 {
            return Err(ConfigError::InvalidRetentionHorizon {
                seconds: args.retention_horizon_seconds,
            });
        }
        if args.retention_sweep_seconds == 0 {
            return Err(ConfigError::InvalidSweepPeriod {
                seconds: args.retention_sweep_seconds,
            });
        }

        let url = Url::parse(&args.upstream_url).map_err(|e| ConfigError::InvalidUrl {
            url: args.upstream_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: args.upstream_url,
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        let coin = args.coin.trim().to_ascii_uppercase();
        if coin.is_empty() {
            return Err(ConfigError::InvalidSymbol(args.coin));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(args.host, args.port),
            grid_width,
            sample_period: Duration::from_millis(args.price_broadcast_interval_ms),
            retention_horizon_seconds: args.retention_horizon_seconds,
            retention_sweep: Duration::from_secs(args.retention_sweep_seconds),
            feed: FeedConfig {
                url,
                coin,
                connect_timeout: Duration::from_millis(args.connect_timeout_ms),
                reconnect: ReconnectPolicy {
                    max_attempts: args.max_reconnect_attempts,
                    delay: Duration::from_millis(args.reconnect_delay_ms),
                },
            },
        })
    }
}
