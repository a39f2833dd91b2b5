use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChartError;

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Convert an 18-decimal fixed-point amount into a float, keeping the
/// integer part exact before adding the fraction.
pub fn wei_to_eth(wei: u128) -> f64 {
    let whole = (wei / WEI_PER_ETH) as f64;
    let frac = (wei % WEI_PER_ETH) as f64 / WEI_PER_ETH as f64;
    whole + frac
}

/// Parse a chain quantity given as a decimal string, a `0x` hex string or a
/// non-negative JSON integer.
pub fn parse_quantity(value: &Value) -> Option<u128> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                if hex.is_empty() {
                    return None;
                }
                u128::from_str_radix(hex, 16).ok()
            } else {
                s.parse::<u128>().ok()
            }
        }
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    }
}

/// A Buy event as delivered by the chain client, before validation. Numeric
/// fields are kept loose so one bad record cannot poison a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPurchaseEvent {
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub eth_amount: Option<Value>,
    #[serde(default)]
    pub token_amount: Option<Value>,
    #[serde(default, alias = "totalRaised")]
    pub cumulative_raised: Option<Value>,
    #[serde(default)]
    pub block_number: Option<Value>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

impl RawPurchaseEvent {
    /// Build a raw record from already-decoded integer fields.
    pub fn from_parts(
        buyer: &str,
        eth_amount: u128,
        token_amount: u128,
        cumulative_raised: u128,
        block_number: u64,
        transaction_hash: &str,
    ) -> Self {
        Self {
            buyer: Some(buyer.to_string()),
            eth_amount: Some(Value::String(eth_amount.to_string())),
            token_amount: Some(Value::String(token_amount.to_string())),
            cumulative_raised: Some(Value::String(cumulative_raised.to_string())),
            block_number: Some(Value::from(block_number)),
            transaction_hash: Some(transaction_hash.to_string()),
        }
    }

    pub fn validate(&self) -> Result<PurchaseEvent, ChartError> {
        let eth_amount = required_quantity(&self.eth_amount, "ethAmount")?;
        let token_amount = required_quantity(&self.token_amount, "tokenAmount")?;
        let cumulative_raised = required_quantity(&self.cumulative_raised, "cumulativeRaised")?;
        let block_number = required_quantity(&self.block_number, "blockNumber")?;
        let block_number = u64::try_from(block_number).map_err(|_| {
            ChartError::MalformedEvent(format!("blockNumber {} out of range", block_number))
        })?;
        let transaction_hash = self
            .transaction_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ChartError::MalformedEvent("missing transactionHash".to_string()))?;

        Ok(PurchaseEvent {
            buyer: self.buyer.clone().unwrap_or_default(),
            eth_amount,
            token_amount,
            cumulative_raised,
            block_number,
            transaction_hash: transaction_hash.to_string(),
        })
    }
}

fn required_quantity(value: &Option<Value>, field: &str) -> Result<u128, ChartError> {
    let value = value
        .as_ref()
        .ok_or_else(|| ChartError::MalformedEvent(format!("missing {}", field)))?;
    parse_quantity(value)
        .ok_or_else(|| ChartError::MalformedEvent(format!("unparseable {}: {}", field, value)))
}

/// A validated purchase on the bonding curve. Amounts are in wei.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEvent {
    pub buyer: String,
    pub eth_amount: u128,
    pub token_amount: u128,
    pub cumulative_raised: u128,
    pub block_number: u64,
    pub transaction_hash: String,
}

impl PurchaseEvent {
    pub fn eth(&self) -> f64 {
        wei_to_eth(self.eth_amount)
    }

    pub fn raised_eth(&self) -> f64 {
        wei_to_eth(self.cumulative_raised)
    }

    /// ETH paid per whole token; 0 when no tokens were received.
    pub fn price_per_token(&self) -> f64 {
        let tokens = wei_to_eth(self.token_amount);
        if tokens > 0.0 {
            self.eth() / tokens
        } else {
            0.0
        }
    }

    /// Normalized key used for de-duplication.
    pub fn dedup_key(&self) -> String {
        self.transaction_hash.to_ascii_lowercase()
    }
}
