use crate::{Computation, IndicatorPoint, Ohlcv, Price, StepInput};

use std::{fmt::Display, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Price field extracted from a [`Bar`](crate::Bar) before feeding into an
/// indicator.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PriceSource {
    /// Opening price.
    Open,
    /// Highest price.
    High,
    /// Closing price.
    #[default]
    Close,
    /// Lowest price.
    Low,
    /// Median price: `(high + low) / 2`.
    HL2,
    /// Typical price: `(high + low + close) / 3`.
    HLC3,
    /// Average price: `(open + high + low + close) / 4`.
    OHLC4,
    /// Weighted close: `(high + low + close + close) / 4`.
    HLCC4,
}

impl PriceSource {
    /// Canonical lowercase name, as used in canonical spec ids.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Close => "close",
            Self::Low => "low",
            Self::HL2 => "hl2",
            Self::HLC3 => "hlc3",
            Self::OHLC4 => "ohlc4",
            Self::HLCC4 => "hlcc4",
        }
    }

    #[inline]
    pub(crate) fn extract(self, ohlcv: &impl Ohlcv) -> Price {
        match self {
            Self::Open => ohlcv.open(),
            Self::High => ohlcv.high(),
            Self::Close => ohlcv.close(),
            Self::Low => ohlcv.low(),
            Self::HL2 => f64::midpoint(ohlcv.high(), ohlcv.low()),
            Self::HLC3 => (ohlcv.high() + ohlcv.low() + ohlcv.close()) / 3.0,
            Self::OHLC4 => (ohlcv.open() + ohlcv.high() + ohlcv.low() + ohlcv.close()) / 4.0,
            Self::HLCC4 => (ohlcv.high() + ohlcv.low() + ohlcv.close() + ohlcv.close()) / 4.0,
        }
    }
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "close" => Ok(Self::Close),
            "low" => Ok(Self::Low),
            "hl2" => Ok(Self::HL2),
            "hlc3" => Ok(Self::HLC3),
            "ohlc4" => Ok(Self::OHLC4),
            "hlcc4" => Ok(Self::HLCC4),
            other => Err(format!("unknown price source `{other}`")),
        }
    }
}

/// Input series of a computation.
///
/// Either a price field of the bar, or one output of another computation
/// evaluated on the same bars. A derived source makes the referenced
/// computation a dependency, e.g. the MACD signal line is an EMA over the
/// `value` output of [`MacdLineConfig`](crate::MacdLineConfig).
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum Source {
    Price(PriceSource),
    Output {
        of: Box<Computation>,
        key: &'static str,
    },
}

impl Source {
    /// Derived source reading output `key` of `of`.
    #[must_use]
    pub fn output(of: impl Into<Computation>, key: &'static str) -> Self {
        Self::Output {
            of: Box::new(of.into()),
            key,
        }
    }

    /// Computations this source needs evaluated first.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Computation> {
        match self {
            Self::Price(_) => Vec::new(),
            Self::Output { of, .. } => vec![(**of).clone()],
        }
    }

    /// Leading bars without a value in this series.
    #[must_use]
    pub fn warmup(&self) -> usize {
        match self {
            Self::Price(_) => 0,
            Self::Output { of, key } => of.output_warmup(key),
        }
    }

    /// `true` when values live on the price scale of the bars.
    #[must_use]
    pub fn is_price(&self) -> bool {
        matches!(self, Self::Price(_))
    }

    /// Reads the source value for the bar of `input`.
    ///
    /// Derived sources read dependency slot `0`. Missing points and nulls
    /// both yield `None`.
    #[inline]
    pub(crate) fn read(&self, input: &StepInput<'_>) -> Option<Price> {
        match self {
            Self::Price(source) => Some(source.extract(input.bar())).filter(|p| p.is_finite()),
            Self::Output { key, .. } => input.dep(0).and_then(|p: &IndicatorPoint| p.get(key)),
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::Price(PriceSource::Close)
    }
}

impl From<PriceSource> for Source {
    fn from(source: PriceSource) -> Self {
        Self::Price(source)
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Price(source) => write!(f, "{source}"),
            Self::Output { of, key } => write!(f, "{of}.{key}"),
        }
    }
}
