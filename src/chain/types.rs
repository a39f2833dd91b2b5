use serde::{Deserialize, Serialize};

use crate::error::ChartError;
use crate::model::purchase::{wei_to_eth, RawPurchaseEvent};

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl<T> RpcResponse<T> {
    /// Error object first; a missing result is `Ok(None)` (e.g. unknown block).
    pub fn into_result(self) -> Result<Option<T>, ChartError> {
        if let Some(err) = self.error {
            return Err(ChartError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(self.result)
    }
}

/// Subset of an `eth_getBlockByNumber` result.
#[derive(Debug, Deserialize)]
pub struct BlockHeader {
    #[serde(default)]
    pub number: Option<String>,
    pub timestamp: String,
}

/// One entry of an `eth_getLogs` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

pub fn parse_hex_u64(s: &str) -> Result<u64, ChartError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| ChartError::MalformedEvent(format!("expected 0x quantity, got '{}'", s)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChartError::MalformedEvent(format!("bad quantity '{}': {}", s, e)))
}

pub fn to_hex_quantity(n: u64) -> String {
    format!("0x{:x}", n)
}

/// 32-byte topic encoding of an indexed uint256 token id.
pub fn token_topic(token_id: u64) -> String {
    format!("0x{:064x}", token_id)
}

/// `None` when the word does not fit in 128 bits.
fn word_to_u128(word: &[u8]) -> Option<u128> {
    let (high, low) = word.split_at(16);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(low);
    Some(u128::from_be_bytes(buf))
}

fn event_word(data: &[u8], index: usize, field: &str) -> Result<u128, ChartError> {
    word_to_u128(&data[index * 32..(index + 1) * 32])
        .ok_or_else(|| ChartError::MalformedEvent(format!("{} does not fit in 128 bits", field)))
}

/// Decode a `Buy(uint256 indexed tokenId, address indexed buyer, uint256
/// ethAmount, uint256 tokenAmount, uint256 totalRaised)` log.
pub fn decode_buy_log(log: &RpcLog) -> Result<RawPurchaseEvent, ChartError> {
    if log.removed {
        return Err(ChartError::MalformedEvent(
            "log removed by chain reorganization".to_string(),
        ));
    }
    let buyer_topic = log
        .topics
        .get(2)
        .ok_or_else(|| ChartError::MalformedEvent("missing buyer topic".to_string()))?;
    let buyer_bytes = hex::decode(buyer_topic.trim_start_matches("0x"))?;
    if buyer_bytes.len() != 32 {
        return Err(ChartError::MalformedEvent(format!(
            "buyer topic has {} bytes",
            buyer_bytes.len()
        )));
    }
    let buyer = format!("0x{}", hex::encode(&buyer_bytes[12..]));

    let data = hex::decode(log.data.trim_start_matches("0x"))?;
    if data.len() < 96 {
        return Err(ChartError::MalformedEvent(format!(
            "Buy data has {} bytes, expected 96",
            data.len()
        )));
    }
    let eth_amount = event_word(&data, 0, "ethAmount")?;
    let token_amount = event_word(&data, 1, "tokenAmount")?;
    let total_raised = event_word(&data, 2, "totalRaised")?;

    let block_number = log
        .block_number
        .as_deref()
        .ok_or_else(|| ChartError::MalformedEvent("pending log without block".to_string()))
        .and_then(parse_hex_u64)?;
    let tx_hash = log
        .transaction_hash
        .as_deref()
        .ok_or_else(|| ChartError::MalformedEvent("log without transaction hash".to_string()))?;

    Ok(RawPurchaseEvent::from_parts(
        &buyer,
        eth_amount,
        token_amount,
        total_raised,
        block_number,
        tx_hash,
    ))
}

/// `tokens(uint256)` selector: first four bytes of its keccak256.
pub const TOKENS_SELECTOR: &str = "4f64b2be";

/// Calldata for `tokens(token_id)` on the factory.
pub fn token_call_data(token_id: u64) -> String {
    format!("0x{}{:064x}", TOKENS_SELECTOR, token_id)
}

/// On-chain sale record for one token, as returned by the factory's
/// `tokens(uint256)` getter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    pub token_address: String,
    pub creator: String,
    pub metadata_uri: String,
    pub total_raised: u128,
    pub total_refunded: u128,
    pub tokens_sold: u128,
    /// Unix seconds the sale closes at.
    pub deadline: i64,
    pub failed_timestamp: i64,
    pub bonded: bool,
    pub failed: bool,
}

impl TokenState {
    pub fn raised_eth(&self) -> f64 {
        wei_to_eth(self.total_raised)
    }

    /// Seconds until the deadline, never negative.
    pub fn seconds_left(&self, now: i64) -> i64 {
        self.deadline.saturating_sub(now).max(0)
    }
}

const TOKEN_STATE_WORDS: usize = 10;

fn response_word(data: &[u8], index: usize) -> &[u8] {
    &data[index * 32..(index + 1) * 32]
}

fn response_u128(data: &[u8], index: usize, field: &str) -> Result<u128, ChartError> {
    word_to_u128(response_word(data, index))
        .ok_or_else(|| ChartError::MalformedResponse(format!("{} does not fit in 128 bits", field)))
}

fn response_i64(data: &[u8], index: usize, field: &str) -> Result<i64, ChartError> {
    let value = response_u128(data, index, field)?;
    i64::try_from(value)
        .map_err(|_| ChartError::MalformedResponse(format!("{} out of range: {}", field, value)))
}

fn response_address(data: &[u8], index: usize) -> String {
    format!("0x{}", hex::encode(&response_word(data, index)[12..]))
}

fn response_bool(data: &[u8], index: usize) -> bool {
    response_word(data, index).iter().any(|b| *b != 0)
}

fn response_string(data: &[u8], offset_index: usize) -> Result<String, ChartError> {
    let bad = || ChartError::MalformedResponse("metadata string out of bounds".to_string());
    let offset = response_u128(data, offset_index, "string offset")?;
    let offset = usize::try_from(offset).map_err(|_| bad())?;
    let body = offset.checked_add(32).ok_or_else(bad)?;
    let len_word = data.get(offset..body).ok_or_else(bad)?;
    let len = word_to_u128(len_word)
        .and_then(|l| usize::try_from(l).ok())
        .ok_or_else(bad)?;
    let end = body.checked_add(len).ok_or_else(bad)?;
    let bytes = data.get(body..end).ok_or_else(bad)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Decode the return data of `tokens(uint256)`:
/// `(address, address, string, uint256 x5, bool, bool)`.
/// An unset slot (zero token address) is `Ok(None)`.
pub fn decode_token_state(data: &str) -> Result<Option<TokenState>, ChartError> {
    let data = hex::decode(data.trim_start_matches("0x"))?;
    if data.len() < TOKEN_STATE_WORDS * 32 {
        return Err(ChartError::MalformedResponse(format!(
            "tokens() returned {} bytes, expected at least {}",
            data.len(),
            TOKEN_STATE_WORDS * 32
        )));
    }
    if response_word(&data, 0).iter().all(|b| *b == 0) {
        return Ok(None);
    }

    Ok(Some(TokenState {
        token_address: response_address(&data, 0),
        creator: response_address(&data, 1),
        metadata_uri: response_string(&data, 2)?,
        total_raised: response_u128(&data, 3, "totalRaised")?,
        total_refunded: response_u128(&data, 4, "totalRefunded")?,
        tokens_sold: response_u128(&data, 5, "tokensSold")?,
        deadline: response_i64(&data, 6, "deadline")?,
        failed_timestamp: response_i64(&data, 7, "failedTimestamp")?,
        bonded: response_bool(&data, 8),
        failed: response_bool(&data, 9),
    }))
}
