use std::collections::HashSet;

use crate::error::ChartError;
use crate::model::purchase::RawPurchaseEvent;

use super::rpc::{BuyLogFilter, RpcClient};

/// Incremental Buy-event feed for one token. Each poll asks only for blocks
/// past the last one seen and keeps the accumulated, de-duplicated history.
#[derive(Debug, Clone)]
pub struct BuyEventPoller {
    token_id: u64,
    initial_lookback: u64,
    last_block: Option<u64>,
    seen: HashSet<String>,
    events: Vec<RawPurchaseEvent>,
}

impl BuyEventPoller {
    pub fn new(token_id: u64, initial_lookback: u64) -> Self {
        Self {
            token_id,
            initial_lookback,
            last_block: None,
            seen: HashSet::new(),
            events: Vec::new(),
        }
    }

    /// Seed with history fetched up to and including `through_block`.
    pub fn with_history(mut self, history: Vec<RawPurchaseEvent>, through_block: u64) -> Self {
        self.ingest(history, through_block);
        self
    }

    pub fn token_id(&self) -> u64 {
        self.token_id
    }

    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    pub fn events(&self) -> &[RawPurchaseEvent] {
        &self.events
    }

    /// Block range to request given the chain head, if anything is new.
    pub fn next_range(&self, head: u64) -> Option<(u64, u64)> {
        match self.last_block {
            None => Some((head.saturating_sub(self.initial_lookback), head)),
            Some(last) if head > last => Some((last + 1, head)),
            Some(_) => None,
        }
    }

    /// Merge a batch fetched through `head`. Returns how many were new.
    pub fn ingest(&mut self, batch: Vec<RawPurchaseEvent>, head: u64) -> usize {
        let mut added = 0;
        for ev in batch {
            let fresh = match ev.transaction_hash.as_deref() {
                Some(hash) => self.seen.insert(hash.trim().to_ascii_lowercase()),
                // kept so the aggregator can count it as malformed
                None => true,
            };
            if fresh {
                self.events.push(ev);
                added += 1;
            }
        }
        self.last_block = Some(self.last_block.map_or(head, |b| b.max(head)));
        added
    }

    pub async fn poll(
        &mut self,
        rpc: &RpcClient,
        filter: &BuyLogFilter,
    ) -> Result<usize, ChartError> {
        let head = rpc.block_number().await?;
        let Some((from, to)) = self.next_range(head) else {
            return Ok(0);
        };
        let batch = rpc.buy_events(filter, self.token_id, from, to).await?;
        let added = self.ingest(batch, to);
        if added > 0 {
            tracing::info!(token_id = self.token_id, added, head, "New Buy events");
        }
        Ok(added)
    }
}
