use crate::EngineError;

use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A price value.
///
/// Semantic alias for [`f64`]. Documents intent in function signatures
/// without introducing newtype construction overhead.
pub type Price = f64;

/// Bar open timestamp or sequence number.
///
/// Finalized bars must arrive with strictly increasing timestamps. A partial
/// bar may be delivered repeatedly with the same timestamp until it finalizes.
pub type Timestamp = u64;

/// OHLCV data of a single candle.
///
/// Implement this on your own kline/candle type and convert with
/// [`Bar::from_ohlcv`] at the ingestion boundary.
///
/// # Example
///
/// ```
/// use quantedge_engine::{Bar, Ohlcv, Price, Timestamp};
///
/// struct MyKline {
///     o: f64, h: f64, l: f64, c: f64,
///     ts: u64,
/// }
///
/// impl Ohlcv for MyKline {
///     fn open(&self) -> Price { self.o }
///     fn high(&self) -> Price { self.h }
///     fn low(&self) -> Price { self.l }
///     fn close(&self) -> Price { self.c }
///     fn open_time(&self) -> Timestamp { self.ts }
/// }
///
/// let kline = MyKline { o: 1.0, h: 2.0, l: 0.5, c: 1.5, ts: 60 };
/// let bar = Bar::from_ohlcv(&kline, true);
/// assert!(bar.is_partial());
/// assert_eq!(bar.t(), 60);
/// ```
pub trait Ohlcv {
    /// Opening price of the bar.
    fn open(&self) -> Price;

    /// Highest price during the bar.
    fn high(&self) -> Price;

    /// Lowest price during the bar.
    fn low(&self) -> Price;

    /// Closing (or latest) price of the bar.
    fn close(&self) -> Price;

    /// Bar open timestamp or sequence number.
    fn open_time(&self) -> Timestamp;

    /// Trade volume during the bar. Defaults to `0.0`.
    fn volume(&self) -> f64 {
        0.0
    }
}

/// A single candle as stored by the engine.
///
/// `is_partial` is `true` while the bar's period has not closed yet. Partial
/// bars produce provisional indicator points; only a final bar commits
/// indicator state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bar {
    t: Timestamp,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    volume: f64,
    is_partial: bool,
}

impl Bar {
    /// Creates a finalized bar.
    #[must_use]
    pub fn new(t: Timestamp, open: Price, high: Price, low: Price, close: Price, volume: f64) -> Self {
        Self {
            t,
            open,
            high,
            low,
            close,
            volume,
            is_partial: false,
        }
    }

    /// Copies any [`Ohlcv`] value into a bar.
    #[must_use]
    pub fn from_ohlcv(ohlcv: &impl Ohlcv, is_partial: bool) -> Self {
        Self {
            t: ohlcv.open_time(),
            open: ohlcv.open(),
            high: ohlcv.high(),
            low: ohlcv.low(),
            close: ohlcv.close(),
            volume: ohlcv.volume(),
            is_partial,
        }
    }

    /// Marks the bar as still open.
    #[must_use]
    pub fn partial(mut self) -> Self {
        self.is_partial = true;
        self
    }

    /// Marks the bar as closed.
    #[must_use]
    pub fn finalized(mut self) -> Self {
        self.is_partial = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn t(&self) -> Timestamp {
        self.t
    }

    #[inline]
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        !self.is_partial
    }

    /// Checks that prices are finite and `low <= min(open, close)`,
    /// `high >= max(open, close)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidBar`] describing the first violation.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason| EngineError::InvalidBar { t: self.t, reason };

        if ![self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(invalid("non-finite value"));
        }
        if self.high < self.open.max(self.close) {
            return Err(invalid("high below open/close"));
        }
        if self.low > self.open.min(self.close) {
            return Err(invalid("low above open/close"));
        }

        Ok(())
    }
}

impl Ohlcv for Bar {
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
        self.t
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

impl Display for Bar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bar(t: {}, o: {}, h: {}, l: {}, c: {}{})",
            self.t,
            self.open,
            self.high,
            self.low,
            self.close,
            if self.is_partial { ", partial" } else { "" }
        )
    }
}
