//! Configuration loading
//!
//! Resolution priority (highest first):
//! 1. Command-line argument (applied by the binary via [`Config::apply_overrides`])
//! 2. Environment variable (`CATALOG_CONFIG`, `CATALOG_BIND`, `CATALOG_DB`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not an error; a malformed one is.

use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_CONFIG_PATH: &str = "CATALOG_CONFIG";
pub const ENV_BIND: &str = "CATALOG_BIND";
pub const ENV_DATABASE: &str = "CATALOG_DB";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:8080`
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file (created on first run)
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: 10,
        }
    }
}

/// Where rate-limit window records are persisted
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map; counters reset on restart
    Memory,
    /// `rate_limit_windows` table in the service database
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub backend: StoreBackend,
    /// Period of the background sweep removing expired window records
    pub sweep_interval_secs: u64,
    pub tiers: TierQuotas,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sweep_interval_secs: 300,
            tiers: TierQuotas::default(),
        }
    }
}

/// Hourly and burst (per-minute) request maxima for one tier
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct QuotaConfig {
    pub per_hour: u32,
    pub burst: u32,
}

impl QuotaConfig {
    pub const fn new(per_hour: u32, burst: u32) -> Self {
        Self { per_hour, burst }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TierQuotas {
    #[serde(default = "default_tier_quota")]
    pub default: QuotaConfig,
    #[serde(default = "api_tier_quota")]
    pub api: QuotaConfig,
    #[serde(default = "strict_tier_quota")]
    pub strict: QuotaConfig,
}

impl Default for TierQuotas {
    fn default() -> Self {
        Self {
            default: default_tier_quota(),
            api: api_tier_quota(),
            strict: strict_tier_quota(),
        }
    }
}

fn default_tier_quota() -> QuotaConfig {
    QuotaConfig::new(100, 20)
}

fn api_tier_quota() -> QuotaConfig {
    QuotaConfig::new(1000, 50)
}

fn strict_tier_quota() -> QuotaConfig {
    QuotaConfig::new(50, 10)
}

/// Values supplied on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load configuration from TOML (if any) and apply environment overrides.
    ///
    /// `explicit_path` comes from the command line. When given, the file
    /// must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match locate_config_file() {
                Some(path) => Self::from_file(&path)?,
                None => {
                    warn!("No config file found, using compiled defaults");
                    Self::default()
                }
            },
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Environment variables override file values
    fn apply_env(&mut self) {
        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Ok(path) = std::env::var(ENV_DATABASE) {
            self.database.path = PathBuf::from(path);
        }
    }

    /// Command-line values override everything else
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(bind) = &overrides.bind {
            self.server.bind = bind.clone();
        }
        if let Some(path) = &overrides.database {
            self.database.path = path.clone();
        }
        self.validate()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", self.server.bind, e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.database.max_connections == 0 {
            return Err(Error::Config("database.max_connections must be > 0".to_string()));
        }

        let tiers = &self.rate_limit.tiers;
        for (name, quota) in [("default", tiers.default), ("api", tiers.api), ("strict", tiers.strict)] {
            if quota.per_hour == 0 || quota.burst == 0 {
                return Err(Error::Config(format!(
                    "rate_limit.tiers.{} limits must be > 0",
                    name
                )));
            }
        }

        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(Error::Config("rate_limit.sweep_interval_secs must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Find the config file: `CATALOG_CONFIG`, then the per-user config
/// directory, then `/etc/catalog/config.toml` on Linux.
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points to missing file: {}", ENV_CONFIG_PATH, path.display());
    }

    let user_config = dirs::config_dir().map(|d| d.join("catalog").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/catalog/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("catalog").join("catalog.db"))
        .unwrap_or_else(|| PathBuf::from("./catalog_data/catalog.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_quotas() {
        let config = Config::default();
        assert_eq!(config.rate_limit.tiers.default, QuotaConfig::new(100, 20));
        assert_eq!(config.rate_limit.tiers.api, QuotaConfig::new(1000, 50));
        assert_eq!(config.rate_limit.tiers.strict, QuotaConfig::new(50, 10));
        assert_eq!(config.rate_limit.backend, StoreBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_tier_override_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [rate_limit.tiers.strict]
            per_hour = 5
            burst = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.tiers.strict, QuotaConfig::new(5, 2));
        assert_eq!(config.rate_limit.tiers.api, QuotaConfig::new(1000, 50));
    }

    #[test]
    fn test_zero_quota_rejected() {
        let config = Config::from_toml_str(
            r#"
            [rate_limit.tiers.api]
            per_hour = 0
            burst = 1
            "#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(&ConfigOverrides {
            bind: Some("not-an-address".to_string()),
            database: None,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
