//! Configuration for the hub TCP server.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `ADHOC_BIND_ADDR`         (default: "0.0.0.0")
//! - `ADHOC_PORT`              (default: "27312")
//! - `ADHOC_MAX_USERS`         (default: "1024")
//! - `ADHOC_USER_TIMEOUT_SECS` (default: "15")
//! - `ADHOC_SWEEP_INTERVAL_MS` (default: "250")
//! - `ADHOC_PRODUCT_DB`        (default: "products.toml", empty = in-memory)
//! - `ADHOC_STATUS_PATH`       (default: "www/status.xml", empty = disabled)
//! - `ADHOC_SHUTDOWN_MESSAGE`  (default: "ADHOC HUB IS SHUTTING DOWN!")
//!
//! Command-line flags in `main.rs` take precedence over all of these.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use adhoc_core::HubConfig;
use anyhow::Context;

pub const DEFAULT_PORT: u16 = 27312;
pub const DEFAULT_SHUTDOWN_MESSAGE: &str = "ADHOC HUB IS SHUTTING DOWN!";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected users.
    pub max_users: usize,

    /// Idle time after which a user is logged out.
    pub user_timeout: Duration,

    /// How often idle users are looked for.
    pub sweep_interval: Duration,

    /// Product directory file. `None` keeps the directory in memory.
    pub product_db: Option<PathBuf>,

    /// Status XML output. `None` disables it.
    pub status_path: Option<PathBuf>,

    /// Chat notice sent to grouped users on shutdown.
    pub shutdown_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_users: 1024,
            user_timeout: Duration::from_secs(15),
            sweep_interval: Duration::from_millis(250),
            product_db: Some(PathBuf::from("products.toml")),
            status_path: Some(PathBuf::from("www/status.xml")),
            shutdown_message: DEFAULT_SHUTDOWN_MESSAGE.to_string(),
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let bind_addr = lookup("ADHOC_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_or_default(&lookup, "ADHOC_PORT", defaults.port)?;
        let max_users = read_or_default(&lookup, "ADHOC_MAX_USERS", defaults.max_users)?;
        let timeout_secs = read_or_default(&lookup, "ADHOC_USER_TIMEOUT_SECS", 15u64)?;
        let sweep_ms = read_or_default(&lookup, "ADHOC_SWEEP_INTERVAL_MS", 250u64)?;
        let product_db = match lookup("ADHOC_PRODUCT_DB") {
            Some(v) => optional_path(&v),
            None => defaults.product_db,
        };
        let status_path = match lookup("ADHOC_STATUS_PATH") {
            Some(v) => optional_path(&v),
            None => defaults.status_path,
        };
        let shutdown_message =
            lookup("ADHOC_SHUTDOWN_MESSAGE").unwrap_or(defaults.shutdown_message);

        let config = Config {
            bind_addr,
            port,
            max_users,
            user_timeout: Duration::from_secs(timeout_secs),
            sweep_interval: Duration::from_millis(sweep_ms),
            product_db,
            status_path,
            shutdown_message,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_users > 0, "max_users must be at least 1");
        anyhow::ensure!(!self.user_timeout.is_zero(), "user timeout must be non-zero");
        anyhow::ensure!(!self.sweep_interval.is_zero(), "sweep interval must be non-zero");
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_sessions: self.max_users,
            idle_timeout: self.user_timeout,
        }
    }
}

/// Empty string means "disabled".
pub fn optional_path(value: &str) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

fn read_or_default<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, val)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.socket_addr_string(), "0.0.0.0:27312");
        assert_eq!(config.hub_config().max_sessions, 1024);
        assert_eq!(config.hub_config().idle_timeout, Duration::from_secs(15));
    }

    #[test]
    fn overrides_and_disabled_paths() {
        let config = Config::from_lookup(lookup_from(&[
            ("ADHOC_PORT", "30000"),
            ("ADHOC_MAX_USERS", "8"),
            ("ADHOC_USER_TIMEOUT_SECS", "3"),
            ("ADHOC_STATUS_PATH", ""),
            ("ADHOC_PRODUCT_DB", "/tmp/p.toml"),
        ]))
        .unwrap();
        assert_eq!(config.port, 30000);
        assert_eq!(config.max_users, 8);
        assert_eq!(config.user_timeout, Duration::from_secs(3));
        assert_eq!(config.status_path, None);
        assert_eq!(config.product_db, Some(PathBuf::from("/tmp/p.toml")));
    }

    #[test]
    fn bad_values_are_errors() {
        let err = Config::from_lookup(lookup_from(&[("ADHOC_PORT", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ADHOC_PORT"));
        assert!(Config::from_lookup(lookup_from(&[("ADHOC_MAX_USERS", "0")])).is_err());
    }
}
