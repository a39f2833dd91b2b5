use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("unsupported timeframe: {0}s (expected 60/300/900/1800/3600/14400/86400/604800)")]
    InvalidTimeframe(u64),

    #[error("invalid ETH/USD price {0}: must be finite and > 0")]
    InvalidEthPrice(f64),

    #[error("max_candles must be between 1 and 10000")]
    InvalidMaxCandles,

    #[error("invalid bonding curve: {0}")]
    InvalidCurve(String),

    #[error("malformed purchase event: {0}")]
    MalformedEvent(String),

    #[error("malformed contract response: {0}")]
    MalformedResponse(String),

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}
