use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChartError;

/// Supported chart bucket widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    pub fn seconds(self) -> u64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Default number of candles kept on screen for this width.
    pub fn default_max_candles(self) -> usize {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 48,
            Timeframe::M15 => 32,
            Timeframe::M30 => 24,
            Timeframe::H1 => 24,
            Timeframe::H4 => 42,
            Timeframe::D1 => 30,
            Timeframe::W1 => 12,
        }
    }

    pub fn from_seconds(secs: u64) -> Result<Self, ChartError> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.seconds() == secs)
            .ok_or(ChartError::InvalidTimeframe(secs))
    }

    /// Start of the bucket containing `ts` (unix seconds).
    pub fn align(self, ts: i64) -> i64 {
        let width = self.seconds() as i64;
        ts.div_euclid(width) * width
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|tf| tf.label() == trimmed)
            .ok_or_else(|| {
                format!(
                    "unknown timeframe '{}', expected one of 1m/5m/15m/30m/1h/4h/1d/1w",
                    s
                )
            })
    }
}
