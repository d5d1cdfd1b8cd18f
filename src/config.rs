//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the server starts.
//!
//! ## WebSocket listener
//!
//! ### Method 1: Full address
//!
//! ```bash
//! export WS_LISTEN="0.0.0.0:3001"
//! ```
//!
//! ### Method 2: Individual components
//!
//! ```bash
//! export WS_HOST="0.0.0.0"
//! export WS_PORT="3001"
//! ```
//!
//! If `WS_LISTEN` is not set, it is constructed from `WS_HOST` and `WS_PORT`.
//!
//! ## Optional Variables
//!
//! - `LISTEN` - HTTP bind address (default: `0.0.0.0:3000`)
//! - `BASE_URL` - Public prefix of short URLs (default: `http://localhost:3000`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `text`)
//! - `RETRY_MAX_ATTEMPTS` - Delivery attempts per message (default: 5, 1..=100)
//! - `RETRY_DELAY_SECS` - Seconds between attempts (default: 30)
//! - `RETRY_SWEEP_INTERVAL_SECS` - Retry sweep period (default: 5)
//! - `LIVENESS_INTERVAL_SECS` - Liveness sweep period (default: 30)
//! - `IDLE_TIMEOUT_SECS` - Idle time before a channel is probed (default: 60)
//! - `CODE_MAX_ATTEMPTS` - Code generation attempts (default: 10, 1..=100)
//! - `STORE_CAPACITY` - Maximum stored mappings (default: unlimited)
//! - `DELIVERY_FALLBACK` - `any` or `none` (default: `any`)

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::delivery::{DeliverySettings, FallbackPolicy, RetryPolicy};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub ws_listen_addr: String,
    /// Public prefix of short URLs, e.g. `https://s.example.com`.
    pub base_url: String,
    pub log_level: String,
    pub log_format: String,

    // ── Delivery ────────────────────────────────────────────────────────────
    /// Total send attempts per message including the first (`RETRY_MAX_ATTEMPTS`).
    pub retry_max_attempts: u32,
    /// Minimum seconds between two attempts of one message (`RETRY_DELAY_SECS`).
    pub retry_delay_secs: u64,
    pub sweep_interval_secs: u64,
    pub liveness_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub delivery_fallback: FallbackPolicy,

    // ── Storage ─────────────────────────────────────────────────────────────
    pub code_max_attempts: usize,
    /// `None` means the store grows without limit.
    pub store_capacity: Option<usize>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let ws_listen_addr = Self::load_ws_listen_addr();
        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let retry_max_attempts = parse_var("RETRY_MAX_ATTEMPTS", 5)?;
        let retry_delay_secs = parse_var("RETRY_DELAY_SECS", 30)?;
        let sweep_interval_secs = parse_var("RETRY_SWEEP_INTERVAL_SECS", 5)?;
        let liveness_interval_secs = parse_var("LIVENESS_INTERVAL_SECS", 30)?;
        let idle_timeout_secs = parse_var("IDLE_TIMEOUT_SECS", 60)?;
        let code_max_attempts = parse_var("CODE_MAX_ATTEMPTS", 10)?;

        let store_capacity = match env::var("STORE_CAPACITY") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse()
                    .with_context(|| format!("STORE_CAPACITY must be a number, got '{v}'"))?,
            ),
            _ => None,
        };

        let delivery_fallback = match env::var("DELIVERY_FALLBACK") {
            Ok(v) => FallbackPolicy::from_str(&v).map_err(anyhow::Error::msg)?,
            Err(_) => FallbackPolicy::AnyChannel,
        };

        Ok(Self {
            listen_addr,
            ws_listen_addr,
            base_url,
            log_level,
            log_format,
            retry_max_attempts,
            retry_delay_secs,
            sweep_interval_secs,
            liveness_interval_secs,
            idle_timeout_secs,
            delivery_fallback,
            code_max_attempts,
            store_capacity,
        })
    }

    /// Loads the WebSocket bind address with fallback to components.
    ///
    /// Priority:
    /// 1. `WS_LISTEN` environment variable
    /// 2. Constructed from `WS_HOST` (default `0.0.0.0`) and `WS_PORT` (default `3001`)
    fn load_ws_listen_addr() -> String {
        if let Ok(addr) = env::var("WS_LISTEN") {
            return addr;
        }

        let host = env::var("WS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("WS_PORT").unwrap_or_else(|_| "3001".to_string());

        format!("{}:{}", host, port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - a listen address is not `host:port`, or both addresses are equal
    /// - `base_url` is not an absolute http(s) URL
    /// - an attempt limit is outside 1..=100 or an interval is zero
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if !self.ws_listen_addr.contains(':') {
            anyhow::bail!(
                "WS_LISTEN must be in format 'host:port', got '{}'",
                self.ws_listen_addr
            );
        }

        if self.listen_addr == self.ws_listen_addr {
            anyhow::bail!(
                "LISTEN and WS_LISTEN must differ, both are '{}'",
                self.listen_addr
            );
        }

        let base = url::Url::parse(&self.base_url)
            .with_context(|| format!("BASE_URL is not a valid URL: '{}'", self.base_url))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!(
                "BASE_URL must start with 'http://' or 'https://', got '{}'",
                self.base_url
            );
        }

        if !(1..=100).contains(&self.retry_max_attempts) {
            anyhow::bail!(
                "RETRY_MAX_ATTEMPTS must be between 1 and 100, got {}",
                self.retry_max_attempts
            );
        }

        if !(1..=100).contains(&self.code_max_attempts) {
            anyhow::bail!(
                "CODE_MAX_ATTEMPTS must be between 1 and 100, got {}",
                self.code_max_attempts
            );
        }

        if self.sweep_interval_secs == 0 {
            anyhow::bail!("RETRY_SWEEP_INTERVAL_SECS must be greater than 0");
        }
        if self.liveness_interval_secs == 0 {
            anyhow::bail!("LIVENESS_INTERVAL_SECS must be greater than 0");
        }
        if self.idle_timeout_secs == 0 {
            anyhow::bail!("IDLE_TIMEOUT_SECS must be greater than 0");
        }

        if self.store_capacity == Some(0) {
            anyhow::bail!("STORE_CAPACITY must be at least 1 when set");
        }

        Ok(())
    }

    /// Builds the delivery subsystem settings.
    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                retry_delay: Duration::from_secs(self.retry_delay_secs),
            },
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            liveness_interval: Duration::from_secs(self.liveness_interval_secs),
            idle_threshold: Duration::from_secs(self.idle_timeout_secs),
            fallback: self.delivery_fallback,
        }
    }

    /// Prints configuration summary.
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  HTTP listen address: {}", self.listen_addr);
        tracing::info!("  WebSocket listen address: {}", self.ws_listen_addr);
        tracing::info!("  Base URL: {}", self.base_url);
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
        tracing::info!(
            "  Retry: {} attempts, {}s apart, swept every {}s",
            self.retry_max_attempts,
            self.retry_delay_secs,
            self.sweep_interval_secs
        );
        tracing::info!(
            "  Liveness: every {}s, idle after {}s",
            self.liveness_interval_secs,
            self.idle_timeout_secs
        );
        tracing::info!("  Fallback: {:?}", self.delivery_fallback);

        match self.store_capacity {
            Some(capacity) => tracing::info!("  Store capacity: {}", capacity),
            None => tracing::info!("  Store capacity: unlimited"),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{v}'")),
        Err(_) => Ok(default),
    }
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if a variable is malformed or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}
