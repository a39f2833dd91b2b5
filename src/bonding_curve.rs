use serde::{Deserialize, Serialize};

use crate::error::ChartError;

/// Linear bonding curve: market cap rises from `starting_market_cap` to
/// `target_market_cap` as the sale raises `bonding_target_eth`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondingCurve {
    pub starting_market_cap: f64,
    pub target_market_cap: f64,
    pub bonding_target_eth: f64,
}

impl BondingCurve {
    pub fn new(
        starting_market_cap: f64,
        target_market_cap: f64,
        bonding_target_eth: f64,
    ) -> Result<Self, ChartError> {
        let curve = Self {
            starting_market_cap,
            target_market_cap,
            bonding_target_eth,
        };
        curve.validate()?;
        Ok(curve)
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        if !self.bonding_target_eth.is_finite() || self.bonding_target_eth <= 0.0 {
            return Err(ChartError::InvalidCurve(format!(
                "bonding target must be > 0, got {}",
                self.bonding_target_eth
            )));
        }
        if !self.starting_market_cap.is_finite() || self.starting_market_cap < 0.0 {
            return Err(ChartError::InvalidCurve(format!(
                "starting market cap must be >= 0, got {}",
                self.starting_market_cap
            )));
        }
        if !self.target_market_cap.is_finite()
            || self.target_market_cap < self.starting_market_cap
        {
            return Err(ChartError::InvalidCurve(format!(
                "target market cap {} must be >= starting market cap {}",
                self.target_market_cap, self.starting_market_cap
            )));
        }
        Ok(())
    }

    pub fn market_cap(&self, raised_eth: f64) -> f64 {
        market_cap_from_raised(
            raised_eth,
            self.starting_market_cap,
            self.target_market_cap,
            self.bonding_target_eth,
        )
    }

    /// Percent of the bonding target raised, capped at 100.
    pub fn progress_percent(&self, raised_eth: f64) -> f64 {
        let raised = if raised_eth.is_finite() {
            raised_eth.max(0.0)
        } else {
            0.0
        };
        (raised / self.bonding_target_eth * 100.0).min(100.0)
    }

    pub fn is_bonded(&self, raised_eth: f64) -> bool {
        raised_eth >= self.bonding_target_eth
    }
}

/// Market cap for a cumulative raise. `raised` is clamped to
/// `[0, bonding_target]`, so past the target the result stays at `target_mc`.
pub fn market_cap_from_raised(
    raised: f64,
    starting_mc: f64,
    target_mc: f64,
    bonding_target: f64,
) -> f64 {
    if !bonding_target.is_finite() || bonding_target <= 0.0 || raised.is_nan() {
        return starting_mc;
    }
    let capped = raised.clamp(0.0, bonding_target);
    if capped == bonding_target {
        return target_mc;
    }
    starting_mc + (capped / bonding_target) * (target_mc - starting_mc)
}
