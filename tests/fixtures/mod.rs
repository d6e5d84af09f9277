#![allow(dead_code)]

use quantedge_engine::{
    Bar, EngineConfig, EngineContext, IndicatorPoint, Ohlcv, Price, Timeframe, Timestamp,
};
use serde::{Deserialize, de::DeserializeOwned};

pub const TIMEFRAME: Timeframe = Timeframe::hours(1);

/// OHLCV bar parsed from the fixture CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct RefBar {
    pub open_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Ohlcv for RefBar {
    fn open(&self) -> Price {
        self.open
    }

    fn high(&self) -> Price {
        self.high
    }

    fn low(&self) -> Price {
        self.low
    }

    fn close(&self) -> Price {
        self.close
    }

    fn open_time(&self) -> Timestamp {
        self.open_time
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Reference value with timestamp.
#[derive(Debug, Deserialize)]
pub struct RefValue {
    pub open_time: u64,
    pub expected: f64,
}

/// Reference BB value with timestamp.
#[derive(Debug, Deserialize)]
pub struct RefBbValue {
    pub open_time: u64,
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Reference MACD value with timestamp.
#[derive(Debug, Deserialize)]
pub struct RefMacdValue {
    pub open_time: u64,
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

const OHLCV_PATH: &str = "tests/fixtures/data/ohlcv-1h.csv";

/// Load the hourly OHLCV fixture.
pub fn load_reference_ohlcvs() -> Vec<RefBar> {
    load_records(OHLCV_PATH, "invalid OHLCV record")
}

/// Fixture bars as final engine bars.
pub fn load_bars() -> Vec<Bar> {
    load_reference_ohlcvs()
        .iter()
        .map(|b| Bar::from_ohlcv(b, false))
        .collect()
}

/// Load single-value reference data (SMA, EMA, RSI).
pub fn load_ref_values(path: &str) -> Vec<RefValue> {
    load_records(path, "invalid reference record")
}

/// Load BB reference data (upper, middle, lower).
pub fn load_bb_ref(path: &str) -> Vec<RefBbValue> {
    load_records(path, "invalid BB reference record")
}

/// Load MACD reference data (macd, signal, histogram).
pub fn load_macd_ref(path: &str) -> Vec<RefMacdValue> {
    load_records(path, "invalid MACD reference record")
}

/// Engine on the fixture timeframe, large enough to hold every fixture bar.
pub fn engine() -> EngineContext {
    engine_with_capacity(1000)
}

pub fn engine_with_capacity(capacity: usize) -> EngineContext {
    EngineContext::new(
        EngineConfig::builder()
            .capacity(capacity)
            .timeframe(TIMEFRAME)
            .build()
            .expect("valid engine config"),
    )
}

/// Assert two f64 values are within tolerance.
pub fn assert_near(actual: f64, expected: f64, tolerance: f64, context: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{context}: expected {expected:.10}, got {actual:.10}, diff {diff:.2e} > tolerance {tolerance:.2e}"
    );
}

/// Assert two points agree on time, status and every output within tolerance.
pub fn assert_points_match(i: usize, expected: &IndicatorPoint, actual: &IndicatorPoint, tolerance: f64) {
    assert_eq!(expected.t(), actual.t(), "bar {i}: timestamps differ");
    assert_eq!(expected.status(), actual.status(), "bar {i}: status differs");

    for ((key, e), (_, a)) in expected.iter().zip(actual.iter()) {
        match (e, a) {
            (Some(e), Some(a)) => assert_near(a, e, tolerance, &format!("bar {i} {key}")),
            (None, None) => {}
            _ => panic!("bar {i} {key}: expected {e:?}, got {a:?}"),
        }
    }
}

/// Creates perturbed versions of a bar to simulate live repaints.
///
/// Returns 2 partial bars (with shifted close/high/low) followed by the
/// final bar. All share the same `t`.
pub fn repaint_sequence(bar: &Bar) -> Vec<Bar> {
    let t = bar.t();
    vec![
        // First tick: only open is known, close near open
        Bar::new(
            t,
            bar.open(),
            bar.open() * 1.001,
            bar.open() * 0.999,
            bar.open() * 1.0005,
            bar.volume() - 2.0,
        )
        .partial(),
        // Mid-bar: partial movement toward final values
        Bar::new(
            t,
            bar.open(),
            bar.open().midpoint(bar.high()),
            bar.open().midpoint(bar.low()),
            bar.open().midpoint(bar.close()),
            bar.volume() - 1.0,
        )
        .partial(),
        // Final: real OHLCV values
        *bar,
    ]
}

fn load_records<D>(path: &str, expect_msg: &str) -> Vec<D>
where
    D: DeserializeOwned,
{
    let mut rdr =
        csv::Reader::from_path(path).unwrap_or_else(|e| panic!("failed to open {path}: {e}"));

    rdr.deserialize().map(|r| r.expect(expect_msg)).collect()
}
