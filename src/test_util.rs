// src/test_util.rs

use crate::{Bar, IndicatorPoint, Price, StepInput, Timestamp};

use std::num::NonZero;

/// Asserts that two `f64` values are approximately equal using a
/// relative epsilon of `4 * f64::EPSILON`.
macro_rules! assert_approx {
    ($actual:expr, $expected:expr) => {{
        let (a, e) = ($actual, $expected);
        assert!(
            (a - e).abs() <= e.abs() * 4.0 * f64::EPSILON,
            "assert_approx failed: actual={a}, expected={e}, diff={}",
            (a - e).abs(),
        );
    }};
}

pub(crate) use assert_approx;

pub fn nz(n: usize) -> NonZero<usize> {
    NonZero::new(n).unwrap()
}

/// Final bar with explicit OHLC values.
pub fn ohlc(open: Price, high: Price, low: Price, close: Price, t: Timestamp) -> Bar {
    Bar::new(t, open, high, low, close, 0.0)
}

/// Convenience: final bar with just a close price and timestamp (OHLC all
/// equal to close).
pub fn bar(close: Price, t: Timestamp) -> Bar {
    ohlc(close, close, close, close, t)
}

/// Final bars at `t = 1, 2, ...` with the given closes.
pub fn bars(closes: &[Price]) -> Vec<Bar> {
    (1..).zip(closes).map(|(t, &c)| bar(c, t)).collect()
}

/// Step inputs without dependencies, one per bar.
pub fn inputs(bars: &[Bar]) -> Vec<StepInput<'_>> {
    bars.iter().map(StepInput::new).collect()
}

/// First output of each point.
pub fn firsts(points: &[IndicatorPoint]) -> Vec<Option<Price>> {
    points.iter().map(IndicatorPoint::value).collect()
}
