use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::aggregator::MAX_CANDLES;
use crate::bonding_curve::BondingCurve;
use crate::model::timeframe::Timeframe;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub curve: CurveConfig,
    pub chart: ChartConfig,
    pub chain: ChainConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurveConfig {
    pub starting_market_cap_usd: f64,
    pub target_market_cap_usd: f64,
    pub bonding_target_eth: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    pub timeframe: String,
    /// Overrides the per-timeframe window length when set.
    #[serde(default)]
    pub max_candles: Option<usize>,
    pub fallback_eth_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub factory_address: String,
    pub buy_topic: String,
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    #[serde(default = "default_initial_lookback")]
    pub initial_lookback: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// First block to scan when fetching a token's full history.
    #[serde(default)]
    pub deploy_block: u64,
    pub eth_price_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_max_block_range() -> u64 {
    2_000
}

fn default_initial_lookback() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

/// Parse a chart timeframe label ("1m", "5m", ... "1w").
pub fn parse_timeframe(s: &str) -> Result<Timeframe> {
    s.parse::<Timeframe>().map_err(anyhow::Error::msg)
}

impl CurveConfig {
    pub fn bonding_curve(&self) -> Result<BondingCurve> {
        BondingCurve::new(
            self.starting_market_cap_usd,
            self.target_market_cap_usd,
            self.bonding_target_eth,
        )
        .context("curve section is invalid")
    }
}

impl ChartConfig {
    pub fn timeframe(&self) -> Result<Timeframe> {
        parse_timeframe(&self.timeframe)
    }

    pub fn max_candles_for(&self, timeframe: Timeframe) -> usize {
        self.max_candles
            .filter(|n| *n > 0)
            .unwrap_or_else(|| timeframe.default_max_candles())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::from_toml(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if let Ok(url) = std::env::var("LAUNCH_CHART_RPC_URL") {
            if !url.trim().is_empty() {
                config.chain.rpc_url = url.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid config TOML")?;
        config.curve.bonding_curve()?;
        config
            .chart
            .timeframe()
            .context("chart.timeframe is invalid")?;
        if !config.chart.fallback_eth_usd.is_finite() || config.chart.fallback_eth_usd <= 0.0 {
            anyhow::bail!(
                "chart.fallback_eth_usd must be > 0, got {}",
                config.chart.fallback_eth_usd
            );
        }
        if let Some(n) = config.chart.max_candles.filter(|n| *n > MAX_CANDLES) {
            anyhow::bail!("chart.max_candles must be <= {}, got {}", MAX_CANDLES, n);
        }
        if config.chain.max_block_range == 0 {
            anyhow::bail!("chain.max_block_range must be > 0");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_override_ignores_zero() {
        let chart = ChartConfig {
            timeframe: "5m".to_string(),
            max_candles: Some(0),
            fallback_eth_usd: 4_000.0,
        };
        assert_eq!(chart.max_candles_for(Timeframe::M5), 48);
    }
}
