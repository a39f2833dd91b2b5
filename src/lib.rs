pub mod aggregator;
pub mod bonding_curve;
pub mod chain;
pub mod config;
pub mod countdown;
pub mod error;
pub mod price;

pub mod model {
    pub mod candle;
    pub mod purchase;
    pub mod timeframe;
}

pub use aggregator::{build_candles, CandleRequest, CandleSeries, Placement};
pub use bonding_curve::{market_cap_from_raised, BondingCurve};
pub use error::ChartError;
pub use model::candle::{Candle, VolumeBar};
pub use model::purchase::{PurchaseEvent, RawPurchaseEvent};
pub use model::timeframe::Timeframe;
