//! Configuration management for rowcache
//!
//! This module provides a centralized configuration system that supports:
//! - TOML/YAML/JSON configuration files
//! - Environment variable overrides
//! - Reasonable defaults
//! - Configuration validation

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure for rowcache
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RowcacheConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pager: PagerConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RowcacheConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by ROWCACHE_CONFIG env var
    /// 3. ./config/rowcache.{toml,yaml,json}
    /// 4. /etc/rowcache/rowcache.{toml,yaml,json}
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        builder = builder
            .add_source(File::with_name("/etc/rowcache/rowcache").required(false))
            .add_source(File::with_name("./config/rowcache").required(false));

        if let Ok(config_path) = std::env::var("ROWCACHE_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        // Example: ROWCACHE_UPSTREAM__WAREHOUSE_ID=abc123
        builder = builder.add_source(
            Environment::with_prefix("ROWCACHE")
                .separator("__")
                .try_parsing(true),
        );

        let config: RowcacheConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Cache
            .set_default("cache.scope", "local")?
            .set_default("cache.ttl_secs", 600)?
            .set_default("cache.page_size", 500)?
            .set_default("cache.compression_level", 6)?
            .set_default("cache.max_entries", 1_000_000)?
            // Pager
            .set_default("pager.first_page_max_wait_ms", 8000)?
            .set_default("pager.first_page_poll_ms", 150)?
            // Views
            .set_default("view.max_scan_pages", 2000)?
            .set_default("view.build_log_every", 25)?
            // Upstream
            .set_default("upstream.host", "")?
            .set_default("upstream.token", "")?
            .set_default("upstream.warehouse_id", "")?
            .set_default("upstream.connect_timeout_ms", 3000)?
            .set_default("upstream.read_timeout_ms", 30000)?
            .set_default("upstream.poll_interval_ms", 1000)?
            // Logging
            .set_default("logging.level", "info")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.page_size == 0 {
            return Err(ConfigError::Message(
                "cache.page_size must be > 0".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Message("cache.ttl_secs must be > 0".to_string()));
        }

        if self.cache.view_ttl_secs == Some(0) {
            return Err(ConfigError::Message(
                "cache.view_ttl_secs must be > 0 when set".to_string(),
            ));
        }

        if self.cache.compression_level > 9 {
            return Err(ConfigError::Message(format!(
                "cache.compression_level must be <= 9, got {}",
                self.cache.compression_level
            )));
        }

        if self.pager.first_page_poll_ms == 0 {
            return Err(ConfigError::Message(
                "pager.first_page_poll_ms must be > 0".to_string(),
            ));
        }

        if self.view.max_scan_pages == 0 {
            return Err(ConfigError::Message(
                "view.max_scan_pages must be > 0".to_string(),
            ));
        }

        if self.upstream.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "upstream.poll_interval_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Self::set_defaults(Config::builder())?;
        let config: RowcacheConfig = builder
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

/// Cache store configuration (shared by base results and views)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Key namespace prefix for this caller/tenant
    pub scope: String,

    /// TTL applied on every base meta/chunk write
    pub ttl_secs: u64,

    /// TTL for view entries; falls back to `ttl_secs`
    #[serde(default)]
    pub view_ttl_secs: Option<u64>,

    /// Rows per cached page
    pub page_size: usize,

    /// Gzip level (0-9)
    pub compression_level: u32,

    /// Capacity of the in-memory store, in entries
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scope: "local".to_string(),
            ttl_secs: 600,
            view_ttl_secs: None,
            page_size: 500,
            compression_level: 6,
            max_entries: 1_000_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn view_ttl(&self) -> Duration {
        Duration::from_secs(self.view_ttl_secs.unwrap_or(self.ttl_secs))
    }
}

/// Row-range pager configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PagerConfig {
    /// Deadline for the first missing page of a range
    pub first_page_max_wait_ms: u64,

    /// Cache poll interval while waiting
    pub first_page_poll_ms: u64,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            first_page_max_wait_ms: 8000,
            first_page_poll_ms: 150,
        }
    }
}

impl PagerConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.first_page_max_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.first_page_poll_ms.max(1))
    }
}

/// Derived view builder configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewConfig {
    /// Page scan cap when the base row count is still unknown
    pub max_scan_pages: usize,

    /// Log scan progress every N pages (0 disables)
    pub build_log_every: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            max_scan_pages: 2000,
            build_log_every: 25,
        }
    }
}

/// Remote statement engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub host: String,
    pub token: String,
    pub warehouse_id: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,

    /// Status polling interval for streaming statements
    pub poll_interval_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            warehouse_id: String::new(),
            connect_timeout_ms: 3000,
            read_timeout_ms: 30000,
            poll_interval_ms: 1000,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Names of required settings that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("upstream.host");
        }
        if self.token.trim().is_empty() {
            missing.push("upstream.token");
        }
        if self.warehouse_id.trim().is_empty() {
            missing.push("upstream.warehouse_id");
        }
        missing
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
