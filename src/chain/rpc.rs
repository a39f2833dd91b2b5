use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::config::ChainConfig;
use crate::error::ChartError;
use crate::model::purchase::RawPurchaseEvent;

use super::types::{
    decode_buy_log, decode_token_state, parse_hex_u64, to_hex_quantity, token_call_data,
    token_topic, BlockHeader, RpcLog, RpcRequest, RpcResponse, TokenState,
};

/// Where Buy logs live and how wide each `eth_getLogs` window may be.
#[derive(Debug, Clone)]
pub struct BuyLogFilter {
    pub factory_address: String,
    pub buy_topic: String,
    pub max_block_range: u64,
}

impl From<&ChainConfig> for BuyLogFilter {
    fn from(cfg: &ChainConfig) -> Self {
        Self {
            factory_address: cfg.factory_address.clone(),
            buy_topic: cfg.buy_topic.clone(),
            max_block_range: cfg.max_block_range.max(1),
        }
    }
}

/// Split `[from, to]` into inclusive windows of at most `max_range + 1` blocks.
pub fn block_windows(from: u64, to: u64, max_range: u64) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(max_range).min(to);
        out.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    out
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<Option<T>, ChartError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let resp: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        resp.into_result()
    }

    pub async fn block_number(&self) -> Result<u64, ChartError> {
        let hex: Option<String> = self.call("eth_blockNumber", json!([])).await?;
        let hex = hex.ok_or_else(|| ChartError::Rpc {
            code: 0,
            message: "eth_blockNumber returned no result".to_string(),
        })?;
        parse_hex_u64(&hex)
    }

    /// Unix timestamp of `block`, or `None` if the node does not know it.
    pub async fn block_timestamp(&self, block: u64) -> Result<Option<i64>, ChartError> {
        let header: Option<BlockHeader> = self
            .call(
                "eth_getBlockByNumber",
                json!([to_hex_quantity(block), false]),
            )
            .await?;
        match header {
            Some(h) => {
                let ts = parse_hex_u64(&h.timestamp)?;
                Ok(i64::try_from(ts).ok())
            }
            None => Ok(None),
        }
    }

    /// Timestamps for each distinct block. Lookups that fail are logged and
    /// left out of the map.
    pub async fn block_timestamps(&self, blocks: &[u64]) -> HashMap<u64, i64> {
        let mut unique: Vec<u64> = blocks.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut out = HashMap::with_capacity(unique.len());
        for block in unique {
            match self.block_timestamp(block).await {
                Ok(Some(ts)) => {
                    out.insert(block, ts);
                }
                Ok(None) => tracing::warn!(block, "Block not found while resolving timestamp"),
                Err(e) => tracing::warn!(block, error = %e, "Failed to fetch block timestamp"),
            }
        }
        out
    }

    /// Sale record for `token_id` read from the factory at the latest block.
    /// `None` when the factory has no such token.
    pub async fn token_state(
        &self,
        factory_address: &str,
        token_id: u64,
    ) -> Result<Option<TokenState>, ChartError> {
        let params = json!([
            { "to": factory_address, "data": token_call_data(token_id) },
            "latest"
        ]);
        let data: Option<String> = self.call("eth_call", params).await?;
        match data.as_deref() {
            None | Some("0x") | Some("") => Ok(None),
            Some(hex) => decode_token_state(hex),
        }
    }

    /// Raw Buy logs for one token over `[from, to]`.
    pub async fn buy_logs(
        &self,
        filter: &BuyLogFilter,
        token_id: u64,
        from: u64,
        to: u64,
    ) -> Result<Vec<RpcLog>, ChartError> {
        let mut logs = Vec::new();
        for (start, end) in block_windows(from, to, filter.max_block_range) {
            let params = json!([{
                "address": filter.factory_address,
                "topics": [filter.buy_topic, token_topic(token_id)],
                "fromBlock": to_hex_quantity(start),
                "toBlock": to_hex_quantity(end),
            }]);
            let chunk: Option<Vec<RpcLog>> = self.call("eth_getLogs", params).await?;
            let chunk = chunk.unwrap_or_default();
            tracing::debug!(token_id, start, end, count = chunk.len(), "Fetched Buy logs");
            logs.extend(chunk);
        }
        Ok(logs)
    }

    /// Buy events for one token over `[from, to]`. Logs that do not decode
    /// are logged and dropped.
    pub async fn buy_events(
        &self,
        filter: &BuyLogFilter,
        token_id: u64,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawPurchaseEvent>, ChartError> {
        let logs = self.buy_logs(filter, token_id, from, to).await?;
        Ok(decode_logs(&logs))
    }
}

pub fn decode_logs(logs: &[RpcLog]) -> Vec<RawPurchaseEvent> {
    logs.iter()
        .filter_map(|log| match decode_buy_log(log) {
            Ok(ev) => Some(ev),
            Err(e) => {
                tracing::warn!(
                    tx = log.transaction_hash.as_deref().unwrap_or("?"),
                    error = %e,
                    "Skipping undecodable Buy log"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_range_without_overlap() {
        assert_eq!(
            block_windows(100, 4_500, 2_000),
            vec![(100, 2_100), (2_101, 4_101), (4_102, 4_500)]
        );
    }

    #[test]
    fn single_block_window() {
        assert_eq!(block_windows(7, 7, 2_000), vec![(7, 7)]);
    }

    #[test]
    fn empty_when_from_after_to() {
        assert!(block_windows(10, 9, 2_000).is_empty());
    }
}
