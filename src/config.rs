use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// Upstream data provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider API key, substituted into the endpoint template
    pub api_key: String,
    /// Endpoint template; `{network}` and `{api_key}` are substituted per chain
    pub endpoint_template: String,
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
}

/// Aggregation pipeline limits and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of traders kept in the graph
    pub top_traders: usize,
    /// Transaction history entries kept per trader
    pub max_transactions_per_trader: usize,
    /// Records requested per page
    pub page_size: u32,
    /// Concurrent page requests per group
    pub fetch_group_size: usize,
    /// Ceiling on page groups per request
    pub max_fetch_groups: u32,
    /// Ceiling on records accumulated per request
    pub max_records: usize,
    /// Base pause between page groups
    pub fetch_delay_base_ms: u64,
    /// Extra pause is one millisecond per this many records fetched
    pub fetch_delay_records_per_ms: usize,
    /// Cap on the extra pause
    pub fetch_delay_max_extra_ms: u64,
    /// Lookup budget for the block timestamp search
    pub block_search_max_iterations: u32,
    /// Blocks handled per enrichment chunk
    pub enrich_chunk_size: usize,
    /// Concurrent block lookups within a chunk
    pub enrich_concurrency: usize,
    pub enrich_group_delay_ms: u64,
    pub enrich_chunk_delay_ms: u64,
    /// Transfers per enrichment slice
    pub enrichment_slice_size: usize,
    pub enrichment_slice_delay_ms: u64,
    /// Hash-based timestamp recoveries allowed per request
    pub max_recovery_per_request: usize,
    /// Deadline applied to every upstream call
    pub call_timeout_seconds: u64,
}

/// Cache lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub result_ttl_seconds: u64,
    /// Interval between expired-entry sweeps of the result cache
    pub result_check_period_seconds: u64,
    pub block_ttl_seconds: u64,
    /// Interval between expired-entry sweeps of the block cache
    pub block_check_period_seconds: u64,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server host/bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Chain used when the request does not name one
    pub default_chain: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint_template: "https://{network}.g.alchemy.com/v2/{api_key}".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_traders: 100,
            max_transactions_per_trader: 50,
            page_size: 1000,
            fetch_group_size: 3,
            max_fetch_groups: 5,
            max_records: 3000,
            fetch_delay_base_ms: 200,
            fetch_delay_records_per_ms: 100,
            fetch_delay_max_extra_ms: 300,
            block_search_max_iterations: 30,
            enrich_chunk_size: 30,
            enrich_concurrency: 5,
            enrich_group_delay_ms: 50,
            enrich_chunk_delay_ms: 150,
            enrichment_slice_size: 1000,
            enrichment_slice_delay_ms: 200,
            max_recovery_per_request: 50,
            call_timeout_seconds: 20,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            result_ttl_seconds: 900,
            result_check_period_seconds: 600,
            block_ttl_seconds: 86_400,
            block_check_period_seconds: 600,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            default_chain: "eth".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    /// Pipeline settings with every pause removed, for tests and one-shot runs
    pub fn without_delays(mut self) -> Self {
        self.fetch_delay_base_ms = 0;
        self.fetch_delay_max_extra_ms = 0;
        self.enrich_group_delay_ms = 0;
        self.enrich_chunk_delay_ms = 0;
        self.enrichment_slice_delay_ms = 0;
        self
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as `load`, reading an explicit file instead of CONFIG_FILE.
    /// A missing explicit file is an error.
    pub fn load_with_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound(path.to_string()));
        }
        let mut config = Self::load_from_path(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file, falling back to defaults when absent
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(api_key) = env::var("ALCHEMY_API_KEY") {
            self.provider.api_key = api_key;
        }
        if let Ok(template) = env::var("ALCHEMY_ENDPOINT_TEMPLATE") {
            self.provider.endpoint_template = template;
        }
        if let Some(timeout) = parse_env("PROVIDER_TIMEOUT_SECONDS")? {
            self.provider.timeout_seconds = timeout;
        }

        if let Some(top) = parse_env("TOP_TRADERS")? {
            self.pipeline.top_traders = top;
        }
        if let Some(timeout) = parse_env("CALL_TIMEOUT_SECONDS")? {
            self.pipeline.call_timeout_seconds = timeout;
        }

        if let Some(ttl) = parse_env("RESULT_CACHE_TTL_SECONDS")? {
            self.cache.result_ttl_seconds = ttl;
        }
        if let Some(ttl) = parse_env("BLOCK_CACHE_TTL_SECONDS")? {
            self.cache.block_ttl_seconds = ttl;
        }

        if let Some(port) = parse_env("PORT")? {
            self.api.port = port;
        }
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let template = &self.provider.endpoint_template;
        if !template.starts_with("http://") && !template.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(template.clone()));
        }
        if !template.contains("{network}") {
            return Err(ConfigError::InvalidValue {
                key: "provider.endpoint_template".to_string(),
                value: template.clone(),
            });
        }

        if self.provider.timeout_seconds == 0 || self.provider.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "provider.timeout_seconds".to_string(),
                value: self.provider.timeout_seconds.to_string(),
            });
        }

        let positive = [
            ("pipeline.top_traders", self.pipeline.top_traders),
            ("pipeline.max_transactions_per_trader", self.pipeline.max_transactions_per_trader),
            ("pipeline.fetch_group_size", self.pipeline.fetch_group_size),
            ("pipeline.max_records", self.pipeline.max_records),
            ("pipeline.fetch_delay_records_per_ms", self.pipeline.fetch_delay_records_per_ms),
            ("pipeline.enrich_chunk_size", self.pipeline.enrich_chunk_size),
            ("pipeline.enrich_concurrency", self.pipeline.enrich_concurrency),
            ("pipeline.enrichment_slice_size", self.pipeline.enrichment_slice_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }

        if self.pipeline.page_size == 0 || self.pipeline.page_size > 1000 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.page_size".to_string(),
                value: self.pipeline.page_size.to_string(),
            });
        }

        if self.pipeline.max_fetch_groups == 0 || self.pipeline.block_search_max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.max_fetch_groups".to_string(),
                value: self.pipeline.max_fetch_groups.to_string(),
            });
        }

        if self.pipeline.call_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.call_timeout_seconds".to_string(),
                value: "0".to_string(),
            });
        }

        if self.cache.result_ttl_seconds == 0 || self.cache.block_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.ttl_seconds".to_string(),
                value: "0".to_string(),
            });
        }

        if self.api.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.port".to_string(),
                value: self.api.port.to_string(),
            });
        }

        if crate::blockchain::Chain::from_key(&self.api.default_chain).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "api.default_chain".to_string(),
                value: self.api.default_chain.clone(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
