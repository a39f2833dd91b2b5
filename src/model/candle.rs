use serde::Serialize;

/// One OHLCV bucket. Prices are market caps in USD, volume is USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// A bucket with no trades: every price equals `price`, no volume.
    pub fn flat(time: i64, price: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn is_flat(&self) -> bool {
        self.volume == 0.0
            && self.open == self.close
            && self.high == self.open
            && self.low == self.open
    }
}

/// Histogram entry drawn under the candles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeBar {
    pub time: i64,
    pub value: f64,
    pub bullish: bool,
}

impl From<&Candle> for VolumeBar {
    fn from(c: &Candle) -> Self {
        Self {
            time: c.time,
            value: c.volume,
            bullish: c.is_bullish(),
        }
    }
}

/// Folds the market-cap readings of one bucket into a candle.
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CandleBuilder {
    /// Start a bucket at `time` opening at `open`.
    pub fn new(time: i64, open: f64) -> Self {
        Self {
            time,
            open,
            high: open,
            low: open,
            close: open,
            volume: 0.0,
        }
    }

    /// Record one trade: its market-cap reading and USD volume.
    pub fn update(&mut self, market_cap: f64, volume: f64) {
        self.high = self.high.max(market_cap);
        self.low = self.low.min(market_cap);
        self.close = market_cap;
        self.volume += volume;
    }

    pub fn finish(&self) -> Candle {
        Candle {
            time: self.time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_builder_basics() {
        let mut cb = CandleBuilder::new(600, 100.0);
        cb.update(105.0, 10.0);
        cb.update(95.0, 5.0);
        cb.update(102.0, 1.5);

        let candle = cb.finish();
        assert_eq!(candle.time, 600);
        assert!((candle.open - 100.0).abs() < f64::EPSILON);
        assert!((candle.high - 105.0).abs() < f64::EPSILON);
        assert!((candle.low - 95.0).abs() < f64::EPSILON);
        assert!((candle.close - 102.0).abs() < f64::EPSILON);
        assert!((candle.volume - 16.5).abs() < f64::EPSILON);
        assert!(candle.is_bullish());
    }

    #[test]
    fn bearish_candle_marks_volume_bar() {
        let candle = Candle {
            time: 0,
            open: 100.0,
            high: 105.0,
            low: 90.0,
            close: 95.0,
            volume: 3.0,
        };
        assert!(!candle.is_bullish());
        let bar = VolumeBar::from(&candle);
        assert!(!bar.bullish);
        assert!((bar.value - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flat_candle_is_flat() {
        let c = Candle::flat(60, 5_000.0);
        assert!(c.is_flat());
        assert!(c.is_bullish());
    }
}
