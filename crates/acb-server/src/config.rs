//! Server configuration

use acb_common::Amount;
use acb_protocol::ProtocolConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// ACB server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// Journal file; memory-only ledger when unset
    pub journal_path: Option<PathBuf>,
    /// Lending policy
    pub protocol: ProtocolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            journal_path: None,
            protocol: ProtocolConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, defaults for missing keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        // Platform PORT first, ACB_PORT wins when both are set
        if let Some(port) = parse(&lookup, "PORT")? {
            cfg.port = port;
        }
        if let Some(port) = parse(&lookup, "ACB_PORT")? {
            cfg.port = port;
        }
        if let Some(host) = lookup("ACB_HOST") {
            cfg.host = host;
        }
        if let Some(path) = lookup("ACB_JOURNAL_PATH").filter(|p| !p.trim().is_empty()) {
            cfg.journal_path = Some(PathBuf::from(path));
        }

        let protocol = &mut cfg.protocol;
        if let Some(ms) = parse::<u64, _>(&lookup, "ACB_LOCK_TIMEOUT_MS")? {
            protocol.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(owner) = lookup("ACB_OWNER_EXTERNAL_ID").filter(|o| !o.trim().is_empty()) {
            protocol.owner_external_id = Some(owner);
        }

        // Pool curve
        if let Some(v) = parse(&lookup, "ACB_POOL_BASE_RATE_BPS")? {
            protocol.rate_params.base_rate_bps = v;
        }
        if let Some(v) = parse(&lookup, "ACB_POOL_UTILIZATION_COEFFICIENT")? {
            protocol.rate_params.utilization_coefficient = v;
        }
        if let Some(v) = parse(&lookup, "ACB_POOL_CREDIT_COEFFICIENT")? {
            protocol.rate_params.credit_coefficient = v;
        }
        if let Some(v) = parse(&lookup, "ACB_POOL_RESERVE_FACTOR_BPS")? {
            anyhow::ensure!(v <= 10_000, "ACB_POOL_RESERVE_FACTOR_BPS must be at most 10000");
            protocol.rate_params.reserve_factor_bps = v;
        }

        // Borrowing
        if let Some(v) = parse::<Amount, _>(&lookup, "ACB_BASE_ALLOWANCE")? {
            protocol.base_allowance = v;
        }
        if let Some(v) = parse(&lookup, "ACB_MAX_DURATION_DAYS")? {
            anyhow::ensure!(v >= 1, "ACB_MAX_DURATION_DAYS must be at least 1");
            protocol.max_duration_days = v;
        }

        Ok(cfg)
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(None),
    }
}
