use crate::{
    BbConfig, ComputeAdapter, DeviationConfig, EmaConfig, EngineError, MacdConfig,
    MacdLineConfig, Params, RsiConfig, SmaConfig,
};

use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Indicator kinds known to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    /// Rolling population standard deviation.
    Deviation,
    /// `EMA(fast) - EMA(slow)`.
    MacdLine,
    Macd,
    Bb,
}

impl IndicatorKind {
    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Rsi => "rsi",
            Self::Deviation => "stdev",
            Self::MacdLine => "macd_line",
            Self::Macd => "macd",
            Self::Bb => "bb",
        }
    }
}

impl Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sma" => Ok(Self::Sma),
            "ema" => Ok(Self::Ema),
            "rsi" => Ok(Self::Rsi),
            "stdev" => Ok(Self::Deviation),
            "macd_line" => Ok(Self::MacdLine),
            "macd" => Ok(Self::Macd),
            "bb" => Ok(Self::Bb),
            other => Err(format!("unknown indicator kind `{other}`")),
        }
    }
}

/// How a consumer should draw one output series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputStyle {
    Line,
    Histogram,
}

/// Where an indicator is drawn by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pane {
    /// On top of the price bars.
    Price,
    /// In its own pane below the bars.
    Separate,
}

/// Declared metadata of one indicator output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputMeta {
    pub key: &'static str,
    pub style: OutputStyle,
    /// Drawn on the price scale.
    pub overlay: bool,
    /// Leading bars with a `None` value.
    pub warmup: usize,
}

impl OutputMeta {
    #[must_use]
    pub fn line(key: &'static str, overlay: bool, warmup: usize) -> Self {
        Self {
            key,
            style: OutputStyle::Line,
            overlay,
            warmup,
        }
    }

    #[must_use]
    pub fn histogram(key: &'static str, warmup: usize) -> Self {
        Self {
            key,
            style: OutputStyle::Histogram,
            overlay: false,
            warmup,
        }
    }
}

/// A fully parameterized computation, independent of timeframe.
///
/// Closed set of indicator kinds; each variant holds the normalized config,
/// which doubles as that kind's [`ComputeAdapter`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Computation {
    Sma(SmaConfig),
    Ema(EmaConfig),
    Rsi(RsiConfig),
    Deviation(DeviationConfig),
    MacdLine(MacdLineConfig),
    Macd(MacdConfig),
    Bb(BbConfig),
}

macro_rules! dispatch {
    ($self:expr, $config:ident => $body:expr) => {
        match $self {
            Computation::Sma($config) => $body,
            Computation::Ema($config) => $body,
            Computation::Rsi($config) => $body,
            Computation::Deviation($config) => $body,
            Computation::MacdLine($config) => $body,
            Computation::Macd($config) => $body,
            Computation::Bb($config) => $body,
        }
    };
}

macro_rules! impl_from_config {
    ($($variant:ident($config:ty)),+ $(,)?) => {
        $(
            impl From<$config> for Computation {
                fn from(config: $config) -> Self {
                    Self::$variant(config)
                }
            }
        )+
    };
}

impl_from_config!(
    Sma(SmaConfig),
    Ema(EmaConfig),
    Rsi(RsiConfig),
    Deviation(DeviationConfig),
    MacdLine(MacdLineConfig),
    Macd(MacdConfig),
    Bb(BbConfig),
);

impl Computation {
    /// Normalizes loosely-typed parameters for `kind`.
    ///
    /// Fills defaults, rejects unknown keys and out-of-range values.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidIndicatorParams`] on any normalization failure.
    pub fn from_params(kind: IndicatorKind, params: &Params) -> Result<Self, EngineError> {
        match kind {
            IndicatorKind::Sma => SmaConfig::from_params(params).map(Self::from),
            IndicatorKind::Ema => EmaConfig::from_params(params).map(Self::from),
            IndicatorKind::Rsi => RsiConfig::from_params(params).map(Self::from),
            IndicatorKind::Deviation => DeviationConfig::from_params(params).map(Self::from),
            IndicatorKind::MacdLine => MacdLineConfig::from_params(params).map(Self::from),
            IndicatorKind::Macd => MacdConfig::from_params(params).map(Self::from),
            IndicatorKind::Bb => BbConfig::from_params(params).map(Self::from),
        }
    }

    #[must_use]
    pub fn kind(&self) -> IndicatorKind {
        dispatch!(self, c => c.kind())
    }

    /// Normalized parameters, every default made explicit.
    #[must_use]
    pub fn params(&self) -> Params {
        dispatch!(self, c => c.params())
    }

    #[must_use]
    pub fn keys(&self) -> &'static [&'static str] {
        dispatch!(self, c => c.keys())
    }

    #[must_use]
    pub fn outputs(&self) -> Vec<OutputMeta> {
        dispatch!(self, c => c.outputs())
    }

    #[must_use]
    pub fn warmup(&self) -> usize {
        dispatch!(self, c => c.warmup())
    }

    /// Warmup of output `key`, or of the whole computation for an unknown key.
    #[must_use]
    pub fn output_warmup(&self, key: &str) -> usize {
        self.outputs()
            .iter()
            .find(|o| o.key == key)
            .map_or_else(|| self.warmup(), |o| o.warmup)
    }

    #[must_use]
    pub fn dependencies(&self) -> Vec<Computation> {
        dispatch!(self, c => c.dependencies())
    }

    #[must_use]
    pub fn pane(&self) -> Pane {
        dispatch!(self, c => c.pane())
    }
}

impl Display for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind(), self.params())
    }
}

/// Bar period, in seconds.
///
/// Displays and parses with the largest whole unit: `30s`, `15m`, `4h`, `1d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Timeframe(u64);

impl Timeframe {
    #[must_use]
    pub const fn seconds(n: u64) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn minutes(n: u64) -> Self {
        Self(n * 60)
    }

    #[must_use]
    pub const fn hours(n: u64) -> Self {
        Self(n * 3_600)
    }

    #[must_use]
    pub const fn days(n: u64) -> Self {
        Self(n * 86_400)
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::minutes(1)
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "0s"),
            s if s % 86_400 == 0 => write!(f, "{}d", s / 86_400),
            s if s % 3_600 == 0 => write!(f, "{}h", s / 3_600),
            s if s % 60 == 0 => write!(f, "{}m", s / 60),
            s => write!(f, "{s}s"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in timeframe `{s}`"))?;
        let (count, unit) = s.split_at(split);
        let count: u64 = count
            .parse()
            .map_err(|_| format!("invalid count in timeframe `{s}`"))?;

        let tf = match unit {
            "s" => Self::seconds(count),
            "m" => Self::minutes(count),
            "h" => Self::hours(count),
            "d" => Self::days(count),
            _ => return Err(format!("unknown unit in timeframe `{s}`")),
        };

        if tf.0 == 0 {
            Err(format!("timeframe must be positive, got `{s}`"))
        } else {
            Ok(tf)
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}

/// Deduplication key of a computation: its canonical key string.
///
/// Two specs with the same kind, normalized parameters and timeframe always
/// produce the same id, e.g. `ema(length=12,source=close)@1h`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId(Arc<str>);

impl SpecId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SpecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// The deduplicated identity of a computation: what to compute, and on
/// which timeframe.
///
/// Equality and hashing go through the canonical [`SpecId`].
///
/// # Example
///
/// ```
/// use quantedge_engine::{CanonicalSpec, EmaConfig, Timeframe};
/// use std::num::NonZero;
///
/// let spec = CanonicalSpec::new(EmaConfig::close(NonZero::new(12).unwrap()), Timeframe::hours(1));
/// assert_eq!(spec.id().as_str(), "ema(length=12,source=close)@1h");
/// ```
#[derive(Clone, Debug)]
pub struct CanonicalSpec {
    id: SpecId,
    computation: Computation,
    timeframe: Timeframe,
}

impl CanonicalSpec {
    #[must_use]
    pub fn new(computation: impl Into<Computation>, timeframe: Timeframe) -> Self {
        let computation = computation.into();
        let id = SpecId(format!("{computation}@{timeframe}").into());

        Self {
            id,
            computation,
            timeframe,
        }
    }

    #[must_use]
    pub fn id(&self) -> &SpecId {
        &self.id
    }

    #[must_use]
    pub fn computation(&self) -> &Computation {
        &self.computation
    }

    #[must_use]
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    #[must_use]
    pub fn warmup(&self) -> usize {
        self.computation.warmup()
    }

    /// Direct dependencies, on the same timeframe.
    #[must_use]
    pub fn dependencies(&self) -> Vec<CanonicalSpec> {
        self.computation
            .dependencies()
            .into_iter()
            .map(|c| Self::new(c, self.timeframe))
            .collect()
    }
}

impl PartialEq for CanonicalSpec {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CanonicalSpec {}

impl Hash for CanonicalSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for CanonicalSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
