//! Chunked Log Fetcher
//!
//! Pulls eth_getLogs results for a large block range by walking it in
//! bounded sub-ranges:
//! - sub-ranges are issued strictly in ascending order, one at a time
//! - every query first takes a token from the endpoint's [`RateLimiter`]
//! - a fixed courtesy delay separates consecutive queries
//! - a failing sub-range is not retried; the error carries its bounds and
//!   the records gathered so far so the caller can resume elsewhere
//! - cancellation is checked before each sub-range query, including while
//!   waiting on the limiter, and keeps partial results

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RateLimits;
use crate::rate_limit::RateLimiter;
use crate::rpc::{BlockRange, LogFilter, LogRecord, LogSource};

/// Sequential, rate-limited log fetcher bound to one source.
pub struct ChunkedLogFetcher {
    source: Arc<dyn LogSource>,
    limiter: Arc<RateLimiter>,
    chunk_size: u64,
    batch_delay: Duration,
}

impl ChunkedLogFetcher {
    pub fn new(
        source: Arc<dyn LogSource>,
        limiter: Arc<RateLimiter>,
        chunk_size: u64,
        batch_delay: Duration,
    ) -> Result<Self, FetchError> {
        if chunk_size == 0 {
            return Err(FetchError::InvalidChunkSize);
        }
        Ok(Self {
            source,
            limiter,
            chunk_size,
            batch_delay,
        })
    }

    /// Build with the chunk size and batch delay from the run configuration.
    pub fn from_config(
        source: Arc<dyn LogSource>,
        limiter: Arc<RateLimiter>,
        limits: &RateLimits,
    ) -> Result<Self, FetchError> {
        Self::new(source, limiter, limits.log_block_chunk_size, limits.batch_delay())
    }

    #[inline]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    #[inline]
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch every matching log in `range`, in source order.
    pub async fn fetch(
        &self,
        range: BlockRange,
        filter: &LogFilter,
    ) -> Result<Vec<LogRecord>, FetchError> {
        self.fetch_with_cancel(range, filter, &CancellationToken::new())
            .await
    }

    /// Like [`fetch`](Self::fetch), stopping before the next sub-range once
    /// `cancel` fires.
    pub async fn fetch_with_cancel(
        &self,
        range: BlockRange,
        filter: &LogFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<LogRecord>, FetchError> {
        let started = Instant::now();
        let total_chunks = range.chunk_count(self.chunk_size);
        let mut logs: Vec<LogRecord> = Vec::new();

        info!(
            source = %self.source.name(),
            range = %range,
            chunk_size = self.chunk_size,
            chunks = total_chunks,
            "Fetching logs"
        );

        let mut chunks = range.chunks(self.chunk_size).peekable();
        let mut chunk_idx = 0u64;

        while let Some(chunk) = chunks.next() {
            // A cancel that fires during the limiter wait must stop the query too.
            let admitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = self.limiter.acquire() => !cancel.is_cancelled(),
            };
            if !admitted {
                info!(
                    resume_from = chunk.from_block(),
                    fetched = logs.len(),
                    "Log fetch cancelled"
                );
                return Err(FetchError::Cancelled {
                    resume_from: chunk.from_block(),
                    partial: logs,
                });
            }

            match self.source.get_logs(filter, chunk).await {
                Ok(batch) => {
                    chunk_idx += 1;
                    debug!(
                        chunk = chunk_idx,
                        of = total_chunks,
                        range = %chunk,
                        logs = batch.len(),
                        "Fetched log chunk"
                    );
                    logs.extend(batch);
                }
                Err(e) => {
                    warn!(
                        source = %self.source.name(),
                        range = %chunk,
                        fetched = logs.len(),
                        error = %e,
                        "Log chunk query failed"
                    );
                    return Err(FetchError::Query {
                        range: chunk,
                        source_name: self.source.name().to_string(),
                        partial: logs,
                        source: e,
                    });
                }
            }

            if chunks.peek().is_some() && !self.batch_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.batch_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        info!(
            source = %self.source.name(),
            range = %range,
            logs = logs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Log fetch complete"
        );

        Ok(logs)
    }
}

/// Failure of a chunked fetch.
#[derive(Debug)]
pub enum FetchError {
    /// Chunk size of zero.
    InvalidChunkSize,
    /// A sub-range query failed. `partial` holds everything fetched before it.
    Query {
        range: BlockRange,
        source_name: String,
        partial: Vec<LogRecord>,
        source: anyhow::Error,
    },
    /// Cancelled before the sub-range starting at `resume_from`.
    Cancelled {
        resume_from: u64,
        partial: Vec<LogRecord>,
    },
}

impl FetchError {
    /// First block not yet covered, if the fetch got under way.
    pub fn resume_from(&self) -> Option<u64> {
        match self {
            Self::InvalidChunkSize => None,
            Self::Query { range, .. } => Some(range.from_block()),
            Self::Cancelled { resume_from, .. } => Some(*resume_from),
        }
    }

    /// Part of `original` still to be fetched after this error.
    pub fn remaining(&self, original: BlockRange) -> Option<BlockRange> {
        let from = self.resume_from()?;
        BlockRange::new(from, original.to_block()).ok()
    }

    /// Records gathered before the failure. Empty for configuration errors.
    pub fn partial(&self) -> &[LogRecord] {
        match self {
            Self::InvalidChunkSize => &[],
            Self::Query { partial, .. } | Self::Cancelled { partial, .. } => partial,
        }
    }

    /// Take ownership of the records gathered before the failure.
    pub fn into_partial(self) -> Vec<LogRecord> {
        match self {
            Self::InvalidChunkSize => Vec::new(),
            Self::Query { partial, .. } | Self::Cancelled { partial, .. } => partial,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidChunkSize => write!(f, "log chunk size must be greater than zero"),
            Self::Query {
                range,
                source_name,
                partial,
                source,
            } => write!(
                f,
                "log query for blocks {} on {} failed after {} logs: {}",
                range,
                source_name,
                partial.len(),
                source
            ),
            Self::Cancelled {
                resume_from,
                partial,
            } => write!(
                f,
                "log fetch cancelled at block {} after {} logs",
                resume_from,
                partial.len()
            ),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Query { source, .. } => Some(&**source),
            _ => None,
        }
    }
}
