//! RPC Access
//!
//! Typed JSON-RPC client plus the [`LogSource`] seam the chunked fetcher pulls
//! from. Anything that can answer an eth_getLogs-style query for one block
//! range (an HTTP endpoint, a recorded fixture, a test double) implements it.

pub mod client;
pub mod types;

pub use client::{ChainInfo, JsonRpcClient, MONAD};
pub use types::{
    parse_quantity, BlockChunks, BlockRange, BlockSummary, BlockTag, LogFilter, LogRecord,
    RangeError,
};

use anyhow::Result;
use async_trait::async_trait;

/// A backend able to return the logs matching `filter` within one range.
///
/// Implementations must return logs in the source's own order (ascending
/// block, then intra-block order); the fetcher never reorders them.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn get_logs(&self, filter: &LogFilter, range: BlockRange) -> Result<Vec<LogRecord>>;

    /// Label used in logs and errors.
    fn name(&self) -> &str {
        "log-source"
    }
}
