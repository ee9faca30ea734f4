//! JSON-RPC over HTTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::types::{
    parse_quantity, parse_quantity_u128, BlockRange, BlockSummary, BlockTag, LogFilter,
    LogRecord, RawBlock, RawLog,
};
use super::LogSource;

/// Chain the research targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    pub native_decimals: u8,
    pub explorer_url: &'static str,
}

pub const MONAD: ChainInfo = ChainInfo {
    id: 10143,
    name: "Monad",
    native_symbol: "MON",
    native_decimals: 18,
    explorer_url: "https://explorer.monad.xyz",
};

/// Minimal Ethereum JSON-RPC client bound to one endpoint.
#[derive(Debug)]
pub struct JsonRpcClient {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .context("Failed to build JSON-RPC HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one call and deserialize `result`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", method, self.endpoint))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("{} {}: {}", method, status, text));
        }

        let mut body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = body.get("error") {
            return Err(anyhow::anyhow!("{} RPC error: {}", method, error));
        }

        let result = body
            .get_mut("result")
            .map(serde_json::Value::take)
            .ok_or_else(|| anyhow::anyhow!("{} response has no result", method))?;

        serde_json::from_value(result).with_context(|| format!("Unexpected {} result shape", method))
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let hex: String = self.call("eth_chainId", serde_json::json!([])).await?;
        parse_quantity(&hex)
    }

    pub async fn block_number(&self) -> Result<u64> {
        let hex: String = self.call("eth_blockNumber", serde_json::json!([])).await?;
        parse_quantity(&hex)
    }

    /// Gas price in wei.
    pub async fn gas_price(&self) -> Result<u128> {
        let hex: String = self.call("eth_gasPrice", serde_json::json!([])).await?;
        parse_quantity_u128(&hex)
    }

    pub async fn get_block(&self, tag: BlockTag) -> Result<BlockSummary> {
        let raw: Option<RawBlock> = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([tag.to_param(), false]),
            )
            .await?;
        let raw = raw.ok_or_else(|| anyhow::anyhow!("block {:?} not found", tag))?;
        BlockSummary::try_from(raw)
    }

    pub async fn get_logs(&self, filter: &LogFilter, range: BlockRange) -> Result<Vec<LogRecord>> {
        let raw: Vec<RawLog> = self
            .call("eth_getLogs", serde_json::json!([filter.to_rpc_params(range)]))
            .await?;

        debug!(
            endpoint = %self.endpoint,
            range = %range,
            logs = raw.len(),
            "eth_getLogs"
        );

        raw.into_iter()
            .map(LogRecord::try_from)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Malformed log in range {}", range))
    }
}

#[async_trait]
impl LogSource for JsonRpcClient {
    async fn get_logs(&self, filter: &LogFilter, range: BlockRange) -> Result<Vec<LogRecord>> {
        JsonRpcClient::get_logs(self, filter, range).await
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}
