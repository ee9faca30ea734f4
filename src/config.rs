//! Runtime Configuration
//!
//! Endpoints, rate limits and experiment parameters. Values are read once at
//! process start (environment, `.env`, or a TOML file) and stay immutable for
//! the rest of the run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration shared by the binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub rate_limits: RateLimits,
    pub experiment: ExperimentConfig,
    pub contracts: ContractAddresses,
}

/// RPC endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint used for sending transactions
    pub write: String,
    /// Primary endpoint for logs, blocks and receipts
    pub read: String,
    /// Secondary read endpoint for bulk log pulls when the primary throttles
    pub read_backup: String,
    /// WebSocket endpoint for block subscriptions
    pub wss: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            write: "https://rpc3.monad.xyz".into(),
            read: "https://rpc-mainnet.monadinfra.com".into(),
            read_backup: "https://rpc1.monad.xyz".into(),
            wss: "wss://rpc3.monad.xyz".into(),
        }
    }
}

/// Request pacing towards the RPC providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Max requests per second against a single endpoint
    pub max_rps: u32,
    /// Max block span of a single eth_getLogs call
    pub log_block_chunk_size: u64,
    /// Courtesy delay between consecutive log batches (ms)
    pub batch_delay_ms: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_rps: 25,
            log_block_chunk_size: 100,
            batch_delay_ms: 500,
        }
    }
}

impl RateLimits {
    #[inline]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Experiment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub id: String,
    pub noise_wallet_count: u32,
    pub probe_wallet_count: u32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            id: "exp001".into(),
            noise_wallet_count: 30,
            probe_wallet_count: 10,
        }
    }
}

/// Addresses of the contracts being probed. Empty when not deployed yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractAddresses {
    pub uniswap_pool: String,
    pub kuru_market: String,
    pub monday_perp: String,
    pub dummy_contract: String,
}

impl AppConfig {
    /// Load from environment with defaults.
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup. Used by `from_env` and by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("RPC_WRITE") {
            config.rpc.write = v;
        }
        if let Some(v) = lookup("RPC_READ") {
            config.rpc.read = v;
        }
        if let Some(v) = lookup("RPC_READ_BACKUP") {
            config.rpc.read_backup = v;
        }
        if let Some(v) = lookup("WSS_ENDPOINT") {
            config.rpc.wss = v;
        }
        if let Some(v) = lookup("MAX_RPS") {
            config.rate_limits.max_rps = parse_var("MAX_RPS", &v)?;
        }
        if let Some(v) = lookup("LOG_BLOCK_CHUNK_SIZE") {
            config.rate_limits.log_block_chunk_size = parse_var("LOG_BLOCK_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("BATCH_DELAY_MS") {
            config.rate_limits.batch_delay_ms = parse_var("BATCH_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("EXPERIMENT_ID") {
            config.experiment.id = v;
        }
        if let Some(v) = lookup("UNISWAP_POOL_ADDRESS") {
            config.contracts.uniswap_pool = v;
        }
        if let Some(v) = lookup("KURU_MARKET_ADDRESS") {
            config.contracts.kuru_market = v;
        }
        if let Some(v) = lookup("MONDAY_PERP_ADDRESS") {
            config.contracts.monday_perp = v;
        }
        if let Some(v) = lookup("DUMMY_CONTRACT_ADDRESS") {
            config.contracts.dummy_contract = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. Missing sections fall back to defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or misconfigure the acquisition layer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limits.max_rps == 0 {
            return Err(ConfigError::NonPositive("max_rps"));
        }
        if self.rate_limits.log_block_chunk_size == 0 {
            return Err(ConfigError::NonPositive("log_block_chunk_size"));
        }
        for (name, url) in [
            ("rpc.write", &self.rpc.write),
            ("rpc.read", &self.rpc.read),
            ("rpc.read_backup", &self.rpc.read_backup),
        ] {
            if url.trim().is_empty() {
                return Err(ConfigError::MissingEndpoint(name));
            }
        }
        if self.experiment.id.is_empty() {
            return Err(ConfigError::MissingExperimentId);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors. Raised at load time, never clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
    NonPositive(&'static str),
    MissingEndpoint(&'static str),
    MissingExperimentId,
    Io { path: String, message: String },
    Toml(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {}: {:?}", key, value),
            Self::NonPositive(key) => write!(f, "{} must be greater than zero", key),
            Self::MissingEndpoint(key) => write!(f, "endpoint {} is empty", key),
            Self::MissingExperimentId => write!(f, "experiment id is empty"),
            Self::Io { path, message } => write!(f, "failed to read {}: {}", path, message),
            Self::Toml(msg) => write!(f, "invalid TOML config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
