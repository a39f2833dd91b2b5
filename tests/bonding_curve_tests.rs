use launch_chart::bonding_curve::{market_cap_from_raised, BondingCurve};

const START: f64 = 5_000.0;
const TARGET: f64 = 30_000.0;
const BOND: f64 = 8.5;

#[test]
fn zero_raise_is_starting_cap() {
    assert!((market_cap_from_raised(0.0, START, TARGET, BOND) - START).abs() < 1e-9);
}

#[test]
fn full_raise_is_target_cap() {
    assert!((market_cap_from_raised(BOND, START, TARGET, BOND) - TARGET).abs() < 1e-9);
}

#[test]
fn raise_beyond_target_is_clamped() {
    assert!((market_cap_from_raised(BOND * 2.0, START, TARGET, BOND) - TARGET).abs() < 1e-9);
}

#[test]
fn negative_raise_is_clamped_to_start() {
    assert!((market_cap_from_raised(-1.0, START, TARGET, BOND) - START).abs() < 1e-9);
}

#[test]
fn halfway_raise_interpolates_linearly() {
    let mc = market_cap_from_raised(4.25, START, TARGET, BOND);
    assert!((mc - 17_500.0).abs() < 1e-9);
}

#[test]
fn curve_is_monotonic() {
    let curve = BondingCurve::new(START, TARGET, BOND).unwrap();
    let mut prev = curve.market_cap(0.0);
    for step in 1..=100 {
        let mc = curve.market_cap(step as f64 * 0.1);
        assert!(mc >= prev, "not monotonic at step {}", step);
        assert!(mc <= TARGET);
        prev = mc;
    }
}

#[test]
fn progress_percent_caps_at_hundred() {
    let curve = BondingCurve::new(START, TARGET, BOND).unwrap();
    assert!((curve.progress_percent(4.25) - 50.0).abs() < 1e-9);
    assert!((curve.progress_percent(20.0) - 100.0).abs() < 1e-9);
    assert_eq!(curve.progress_percent(-3.0), 0.0);
    assert!(!curve.is_bonded(8.4));
    assert!(curve.is_bonded(8.5));
}
