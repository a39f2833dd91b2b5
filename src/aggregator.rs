//! Turns a batch of Buy events for one token into a gap-filled candle series.
//!
//! Every call is a pure function of its request and events: no clocks are
//! read and no state is kept between calls, so the caller decides when to
//! re-aggregate (on a timer for the countdown, or on a new-event notice).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::bonding_curve::BondingCurve;
use crate::error::ChartError;
use crate::model::candle::{Candle, CandleBuilder, VolumeBar};
use crate::model::purchase::{PurchaseEvent, RawPurchaseEvent};
use crate::model::timeframe::Timeframe;

/// Largest window `build_candles` accepts.
pub const MAX_CANDLES: usize = 10_000;

/// How events are assigned to time buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Placement {
    /// Newest event in the current bucket, each older event one bucket
    /// further back. Needs no block timestamps.
    #[default]
    RecencyAnchored,
    /// Bucket by real block time (block number -> unix seconds).
    BlockTimestamps(HashMap<u64, i64>),
}

#[derive(Debug, Clone)]
pub struct CandleRequest {
    pub timeframe_seconds: u64,
    pub max_candles: usize,
    pub eth_usd_price: f64,
    /// Wall-clock unix seconds.
    pub now: i64,
    pub curve: BondingCurve,
    pub placement: Placement,
}

impl CandleRequest {
    /// Request using the timeframe's default window length.
    pub fn new(timeframe: Timeframe, curve: BondingCurve, eth_usd_price: f64, now: i64) -> Self {
        Self {
            timeframe_seconds: timeframe.seconds(),
            max_candles: timeframe.default_max_candles(),
            eth_usd_price,
            now,
            curve,
            placement: Placement::RecencyAnchored,
        }
    }

    pub fn with_max_candles(mut self, max_candles: usize) -> Self {
        self.max_candles = max_candles;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub volume: Vec<VolumeBar>,
    /// Close of the newest candle.
    pub current_market_cap: f64,
    /// False when no valid event went into the series.
    pub has_real_data: bool,
    /// Events dropped as malformed.
    pub skipped: usize,
    /// Events dropped because their raise did not exceed an earlier one.
    pub out_of_order: usize,
    /// Cumulative raise in ETH after the newest kept event.
    pub raised_eth: f64,
}

impl CandleSeries {
    /// Absolute and percent change from the first open to the last close.
    pub fn price_change(&self) -> (f64, f64) {
        let (Some(first), Some(last)) = (self.candles.first(), self.candles.last()) else {
            return (0.0, 0.0);
        };
        let change = last.close - first.open;
        let percent = if first.open > 0.0 {
            change / first.open * 100.0
        } else {
            0.0
        };
        (change, percent)
    }
}

/// Bucket `events` into `request.max_candles` candles ending at the bucket
/// containing `request.now`.
pub fn build_candles(
    request: &CandleRequest,
    events: &[RawPurchaseEvent],
) -> Result<CandleSeries, ChartError> {
    let timeframe = Timeframe::from_seconds(request.timeframe_seconds)?;
    if request.max_candles == 0 || request.max_candles > MAX_CANDLES {
        return Err(ChartError::InvalidMaxCandles);
    }
    if !request.eth_usd_price.is_finite() || request.eth_usd_price <= 0.0 {
        return Err(ChartError::InvalidEthPrice(request.eth_usd_price));
    }
    request.curve.validate()?;

    let width = timeframe.seconds() as i64;
    let current_bucket = timeframe.align(request.now);
    let span = i64::try_from(request.max_candles - 1)
        .ok()
        .and_then(|n| n.checked_mul(width))
        .ok_or(ChartError::InvalidMaxCandles)?;
    let start_bucket = current_bucket
        .checked_sub(span)
        .ok_or(ChartError::InvalidMaxCandles)?;

    let (events, skipped, out_of_order) = prepare_events(events);
    let market_caps: Vec<f64> = events
        .iter()
        .map(|ev| request.curve.market_cap(ev.raised_eth()))
        .collect();
    let buckets = assign_buckets(
        &events,
        &request.placement,
        timeframe,
        start_bucket,
        current_bucket,
    );

    // Events older than the window are not drawn, but the newest of them
    // sets the level the window opens at.
    let mut by_bucket: HashMap<i64, Vec<usize>> = HashMap::new();
    let mut prev_close: Option<f64> = None;
    for (idx, bucket) in buckets.iter().enumerate() {
        match bucket {
            Some(time) => by_bucket.entry(*time).or_default().push(idx),
            None => prev_close = Some(market_caps[idx]),
        }
    }
    let before_window = buckets.iter().filter(|b| b.is_none()).count();

    let mut candles = Vec::with_capacity(request.max_candles);
    for k in 0..request.max_candles as i64 {
        let time = start_bucket + k * width;
        let candle = match by_bucket.get(&time) {
            Some(members) => {
                let open = prev_close.unwrap_or(market_caps[members[0]]);
                let mut builder = CandleBuilder::new(time, open);
                for &idx in members {
                    builder.update(market_caps[idx], events[idx].eth() * request.eth_usd_price);
                }
                builder.finish()
            }
            None => Candle::flat(time, prev_close.unwrap_or(request.curve.starting_market_cap)),
        };
        prev_close = Some(candle.close);
        candles.push(candle);
    }

    let current_market_cap = prev_close.unwrap_or(request.curve.starting_market_cap);
    let volume = candles.iter().map(VolumeBar::from).collect();
    let raised_eth = events.last().map_or(0.0, PurchaseEvent::raised_eth);

    tracing::debug!(
        timeframe = %timeframe,
        candles = candles.len(),
        events = events.len(),
        skipped,
        out_of_order,
        before_window,
        current_market_cap,
        "Built candle series"
    );

    Ok(CandleSeries {
        timeframe,
        candles,
        volume,
        current_market_cap,
        has_real_data: !events.is_empty(),
        skipped,
        out_of_order,
        raised_eth,
    })
}

/// Validate, de-duplicate (first occurrence wins) and stable-sort by block.
/// After sorting, events whose raise is at or below the highest raise so far
/// are dropped.
fn prepare_events(raw: &[RawPurchaseEvent]) -> (Vec<PurchaseEvent>, usize, usize) {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for (index, record) in raw.iter().enumerate() {
        match record.validate() {
            Ok(ev) => {
                if seen.insert(ev.dedup_key()) {
                    valid.push(ev);
                } else {
                    tracing::trace!(tx = %ev.transaction_hash, "Dropping duplicate purchase event");
                }
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!(index, error = %e, "Skipping malformed purchase event");
            }
        }
    }

    valid.sort_by_key(|ev| ev.block_number);

    let mut peak: Option<u128> = None;
    let mut out = Vec::with_capacity(valid.len());
    let mut out_of_order = 0;
    for ev in valid {
        match peak {
            Some(p) if ev.cumulative_raised <= p => {
                out_of_order += 1;
                tracing::warn!(
                    tx = %ev.transaction_hash,
                    block = ev.block_number,
                    raised = %ev.cumulative_raised,
                    peak = %p,
                    "Dropping purchase event whose raise does not exceed an earlier one"
                );
            }
            _ => {
                peak = Some(ev.cumulative_raised);
                out.push(ev);
            }
        }
    }
    (out, skipped, out_of_order)
}

/// Bucket for each event, or `None` when it falls before `start_bucket`.
/// Timestamps past the current bucket are pulled back into it.
fn assign_buckets(
    events: &[PurchaseEvent],
    placement: &Placement,
    timeframe: Timeframe,
    start_bucket: i64,
    current_bucket: i64,
) -> Vec<Option<i64>> {
    if let Placement::BlockTimestamps(timestamps) = placement {
        let resolved: Option<Vec<i64>> = events
            .iter()
            .map(|ev| timestamps.get(&ev.block_number).copied())
            .collect();
        match resolved {
            Some(times) => {
                return times
                    .into_iter()
                    .map(|ts| {
                        let bucket = timeframe.align(ts);
                        (bucket >= start_bucket).then(|| bucket.min(current_bucket))
                    })
                    .collect();
            }
            None => {
                tracing::warn!(
                    events = events.len(),
                    known_blocks = timestamps.len(),
                    "Missing block timestamps; falling back to recency-anchored placement"
                );
            }
        }
    }

    let width = timeframe.seconds() as i64;
    let n = events.len();
    (0..n)
        .map(|i| {
            let steps_back = (n - 1 - i) as i64;
            let bucket = current_bucket.saturating_sub(steps_back.saturating_mul(width));
            (bucket >= start_bucket).then_some(bucket)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(i: u64, raised_eth: u128) -> RawPurchaseEvent {
        RawPurchaseEvent::from_parts(
            "0xb",
            1,
            1,
            raised_eth * 1_000_000_000_000_000_000,
            i,
            &format!("0x{}", i),
        )
    }

    #[test]
    fn recency_placement_leaves_overflow_outside_window() {
        let events: Vec<PurchaseEvent> = (0..5)
            .map(|i| event(i, i as u128 + 1).validate().unwrap())
            .collect();
        let buckets = assign_buckets(&events, &Placement::RecencyAnchored, Timeframe::M1, 60, 180);
        assert_eq!(buckets, vec![None, None, Some(60), Some(120), Some(180)]);
    }

    #[test]
    fn timestamp_placement_drops_old_and_pulls_back_future() {
        let events: Vec<PurchaseEvent> = (0..3)
            .map(|i| event(i, i as u128 + 1).validate().unwrap())
            .collect();
        let timestamps = HashMap::from([(0, 30), (1, 125), (2, 900)]);
        let buckets = assign_buckets(
            &events,
            &Placement::BlockTimestamps(timestamps),
            Timeframe::M1,
            60,
            180,
        );
        assert_eq!(buckets, vec![None, Some(120), Some(180)]);
    }

    #[test]
    fn prepare_events_drops_non_increasing_raises() {
        let raw = vec![event(0, 2), event(1, 1), event(2, 2), event(3, 3)];
        let (events, skipped, out_of_order) = prepare_events(&raw);
        assert_eq!(skipped, 0);
        assert_eq!(out_of_order, 2);
        let blocks: Vec<u64> = events.iter().map(|ev| ev.block_number).collect();
        assert_eq!(blocks, vec![0, 3]);
    }
}
