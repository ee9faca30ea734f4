//! Monad Microstructure Library
//!
//! Measurement tooling for transaction-ordering fairness on Monad:
//! paced log acquisition over JSON-RPC, the probe tag codec used to
//! correlate sent transactions with chain data, and the metrics engine.

pub mod config;
pub mod fetcher;
pub mod metrics;
pub mod probe_tag;
pub mod rate_limit;
pub mod rpc;
pub mod telemetry;

pub use config::{AppConfig, ConfigError};
pub use fetcher::{ChunkedLogFetcher, FetchError};
pub use probe_tag::{ProbeTag, ProbeTagError};
pub use rate_limit::{RateLimiter, RateLimiterError};
