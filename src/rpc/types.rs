//! Typed records at the RPC boundary.
//!
//! JSON-RPC hands back hex strings and loosely shaped objects. They are
//! converted here, once, into checked Rust types; nothing downstream looks
//! at raw JSON.

use serde::{Deserialize, Serialize};

/// Inclusive block range `[from_block, to_block]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockRange {
    from_block: u64,
    to_block: u64,
}

impl BlockRange {
    pub fn new(from_block: u64, to_block: u64) -> Result<Self, RangeError> {
        if from_block > to_block {
            return Err(RangeError {
                from_block,
                to_block,
            });
        }
        Ok(Self {
            from_block,
            to_block,
        })
    }

    #[inline]
    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    #[inline]
    pub fn to_block(&self) -> u64 {
        self.to_block
    }

    /// Number of blocks covered (always >= 1). `[0, u64::MAX]` holds 2^64.
    #[inline]
    pub fn block_count(&self) -> u128 {
        (self.to_block - self.from_block) as u128 + 1
    }

    /// Number of sub-ranges [`chunks`](Self::chunks) yields for `chunk_size`.
    #[inline]
    pub fn chunk_count(&self, chunk_size: u64) -> u64 {
        (self.to_block - self.from_block) / chunk_size.max(1) + 1
    }

    /// Split into contiguous sub-ranges of at most `chunk_size` blocks,
    /// ascending. `chunk_size` must be non-zero.
    pub fn chunks(&self, chunk_size: u64) -> BlockChunks {
        debug_assert!(chunk_size > 0, "chunk_size must be non-zero");
        BlockChunks {
            next_from: Some(self.from_block),
            to_block: self.to_block,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from_block, self.to_block)
    }
}

/// Iterator returned by [`BlockRange::chunks`].
#[derive(Debug, Clone)]
pub struct BlockChunks {
    next_from: Option<u64>,
    to_block: u64,
    chunk_size: u64,
}

impl Iterator for BlockChunks {
    type Item = BlockRange;

    fn next(&mut self) -> Option<BlockRange> {
        let from = self.next_from?;
        let to = from.saturating_add(self.chunk_size - 1).min(self.to_block);
        self.next_from = if to >= self.to_block { None } else { Some(to + 1) };
        Some(BlockRange {
            from_block: from,
            to_block: to,
        })
    }
}

/// `from_block > to_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    pub from_block: u64,
    pub to_block: u64,
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid block range: from_block {} > to_block {}",
            self.from_block, self.to_block
        )
    }
}

impl std::error::Error for RangeError {}

/// Address/topic predicate for eth_getLogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub address: Option<String>,
    /// Positional topic filters; `None` matches anything in that slot.
    pub topics: Vec<Option<String>>,
}

impl LogFilter {
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            topics: Vec::new(),
        }
    }

    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topics.push(topic);
        self
    }

    /// eth_getLogs filter object for one sub-range.
    pub fn to_rpc_params(&self, range: BlockRange) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "fromBlock": format!("0x{:x}", range.from_block()),
            "toBlock": format!("0x{:x}", range.to_block()),
        });
        if let Some(address) = &self.address {
            obj["address"] = serde_json::Value::String(address.clone());
        }
        if !self.topics.is_empty() {
            obj["topics"] = serde_json::json!(self.topics);
        }
        obj
    }
}

/// One log entry, validated at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: u64,
    pub log_index: u64,
    pub removed: bool,
}

/// Log as returned on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    block_number: Option<String>,
    block_hash: Option<String>,
    transaction_hash: Option<String>,
    transaction_index: Option<String>,
    log_index: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl TryFrom<RawLog> for LogRecord {
    type Error = anyhow::Error;

    fn try_from(raw: RawLog) -> anyhow::Result<Self> {
        let block_number = raw
            .block_number
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("log without blockNumber (pending log?)"))
            .and_then(parse_quantity)?;
        let transaction_index = raw
            .transaction_index
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("log without transactionIndex"))
            .and_then(parse_quantity)?;
        let log_index = raw
            .log_index
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("log without logIndex"))
            .and_then(parse_quantity)?;

        Ok(Self {
            address: raw.address.to_lowercase(),
            topics: raw.topics,
            data: raw.data,
            block_number,
            block_hash: raw.block_hash.unwrap_or_default(),
            transaction_hash: raw.transaction_hash.unwrap_or_default(),
            transaction_index,
            log_index,
            removed: raw.removed,
        })
    }
}

/// Block selector for eth_getBlockByNumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(n) => format!("0x{:x}", n),
        }
    }
}

/// Header fields the sanity check and Rc computation need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub number: u64,
    pub timestamp: u64,
    pub tx_count: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBlock {
    number: String,
    timestamp: String,
    gas_used: String,
    gas_limit: String,
    #[serde(default)]
    transactions: Vec<serde_json::Value>,
}

impl TryFrom<RawBlock> for BlockSummary {
    type Error = anyhow::Error;

    fn try_from(raw: RawBlock) -> anyhow::Result<Self> {
        Ok(Self {
            number: parse_quantity(&raw.number)?,
            timestamp: parse_quantity(&raw.timestamp)?,
            tx_count: raw.transactions.len() as u64,
            gas_used: parse_quantity(&raw.gas_used)?,
            gas_limit: parse_quantity(&raw.gas_limit)?,
        })
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> anyhow::Result<u64> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("quantity {:?} is missing 0x prefix", s))?;
    if digits.is_empty() {
        anyhow::bail!("empty quantity");
    }
    Ok(u64::from_str_radix(digits, 16)?)
}

/// Parse a hex quantity that may exceed 64 bits (wei amounts).
pub fn parse_quantity_u128(s: &str) -> anyhow::Result<u128> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("quantity {:?} is missing 0x prefix", s))?;
    if digits.is_empty() {
        anyhow::bail!("empty quantity");
    }
    Ok(u128::from_str_radix(digits, 16)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let err = BlockRange::new(10, 9).unwrap_err();
        assert_eq!(err.from_block, 10);
        assert!(BlockRange::new(5, 5).is_ok());
    }

    #[test]
    fn test_chunks_cover_range() {
        let range = BlockRange::new(0, 249).unwrap();
        let chunks: Vec<(u64, u64)> = range
            .chunks(100)
            .map(|r| (r.from_block(), r.to_block()))
            .collect();
        assert_eq!(chunks, vec![(0, 99), (100, 199), (200, 249)]);
    }

    #[test]
    fn test_chunks_single_block_and_exact_fit() {
        let single = BlockRange::new(7, 7).unwrap();
        assert_eq!(single.chunks(100).count(), 1);

        let exact = BlockRange::new(100, 299).unwrap();
        let chunks: Vec<BlockRange> = exact.chunks(100).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].to_block(), 299);
    }

    #[test]
    fn test_full_u64_range_counts() {
        let full = BlockRange::new(0, u64::MAX).unwrap();
        assert_eq!(full.block_count(), u64::MAX as u128 + 1);
        assert_eq!(full.chunk_count(u64::MAX), 2);
        assert_eq!(full.chunks(u64::MAX).count(), 2);
        assert_eq!(full.chunk_count(1 << 63), 2);

        let range = BlockRange::new(0, 249).unwrap();
        assert_eq!(range.block_count(), 250);
        assert_eq!(range.chunk_count(100), 3);
        assert_eq!(BlockRange::new(100, 299).unwrap().chunk_count(100), 2);
    }

    #[test]
    fn test_chunks_near_u64_max() {
        let range = BlockRange::new(u64::MAX - 5, u64::MAX).unwrap();
        let chunks: Vec<BlockRange> = range.chunks(4).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].to_block(), u64::MAX);
    }

    #[test]
    fn test_filter_params() {
        let filter = LogFilter::for_address("0xabc")
            .with_topic(Some("0xddf2".into()))
            .with_topic(None);
        let params = filter.to_rpc_params(BlockRange::new(16, 31).unwrap());
        assert_eq!(params["fromBlock"], "0x10");
        assert_eq!(params["toBlock"], "0x1f");
        assert_eq!(params["address"], "0xabc");
        assert_eq!(params["topics"][1], serde_json::Value::Null);
    }

    #[test]
    fn test_raw_log_conversion() {
        let raw: RawLog = serde_json::from_value(serde_json::json!({
            "address": "0xABCDEF",
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x65",
            "blockHash": "0xbb",
            "transactionHash": "0xtt",
            "transactionIndex": "0x2",
            "logIndex": "0x5",
            "removed": false
        }))
        .unwrap();
        let log = LogRecord::try_from(raw).unwrap();
        assert_eq!(log.block_number, 101);
        assert_eq!(log.log_index, 5);
        assert_eq!(log.address, "0xabcdef");
    }

    #[test]
    fn test_pending_log_rejected() {
        let raw: RawLog = serde_json::from_value(serde_json::json!({
            "address": "0x01",
            "blockNumber": null,
            "transactionIndex": "0x0",
            "logIndex": "0x0"
        }))
        .unwrap();
        assert!(LogRecord::try_from(raw).is_err());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x2766").unwrap(), 10086);
        assert!(parse_quantity("2766").is_err());
        assert!(parse_quantity("0x").is_err());
        assert_eq!(
            parse_quantity_u128("0xde0b6b3a7640000").unwrap(),
            1_000_000_000_000_000_000
        );
    }
}
