use std::{
    hash::{Hash, Hasher},
    num::NonZero,
};

use crate::{
    ComputeAdapter, Computation, DeviationConfig, EngineError, IndicatorKind, OutputMeta, Pane,
    Params, Price, Source, SmaConfig, StepInput, adapter::impl_canonical_display,
    params::ParamReader,
};

/// Standard deviation multiplier for Bollinger Bands.
///
/// Wraps a positive, finite `f64`. The constructor panics on anything else.
///
/// Defaults to `2.0` (the standard Bollinger Bands setting).
///
/// Implements `Eq` and `Hash` via bit-level comparison, which is safe because
/// NaN is rejected at construction.
#[derive(Clone, Copy, Debug)]
pub struct StdDev(f64);

impl StdDev {
    /// Creates a new standard deviation multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `value` is zero, negative, infinite or NaN.
    #[must_use]
    pub fn new(value: f64) -> Self {
        assert!(!value.is_nan(), "std_dev must not be NaN");
        assert!(value > 0.0, "std_dev must be positive");
        assert!(value.is_finite(), "std_dev must be finite");
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for StdDev {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for StdDev {}

impl Hash for StdDev {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Default for StdDev {
    fn default() -> Self {
        Self(2.0)
    }
}

/// Configuration for Bollinger Bands.
///
/// # Example
///
/// ```
/// use quantedge_engine::{BbConfig, ComputeAdapter};
///
/// // Default: length 20, close, 2.0 std devs
/// let config = BbConfig::default();
///
/// assert_eq!(config.length(), 20);
/// assert_eq!(config.to_string(), "bb(length=20,source=close,std_dev=2)");
/// assert_eq!(config.dependencies().len(), 2);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct BbConfig {
    length: usize,
    source: Source,
    std_dev: StdDev,
}

impl BbConfig {
    pub const DEFAULT_LENGTH: usize = 20;

    #[must_use]
    pub fn builder() -> BbConfigBuilder {
        BbConfigBuilder::new()
    }

    #[inline]
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Standard deviation multiplier for the upper and lower bands.
    #[inline]
    #[must_use]
    pub fn std_dev(&self) -> StdDev {
        self.std_dev
    }

    /// BB with custom length, close price, 2σ.
    #[must_use]
    pub fn close(length: NonZero<usize>) -> Self {
        Self::builder().length(length).build()
    }

    /// The middle band.
    #[must_use]
    pub fn middle(&self) -> SmaConfig {
        SmaConfig::builder()
            .length(self.length_nz())
            .source(self.source.clone())
            .build()
    }

    /// The unscaled band offset.
    #[must_use]
    pub fn deviation(&self) -> DeviationConfig {
        DeviationConfig::builder()
            .length(self.length_nz())
            .source(self.source.clone())
            .build()
    }

    fn length_nz(&self) -> NonZero<usize> {
        NonZero::new(self.length).expect("BbConfig invariant violation: length is positive")
    }
}

/// BB(20, Close, 2σ), the standard Bollinger Bands setting.
impl Default for BbConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`BbConfig`].
///
/// Defaults: length = 20, source = [`PriceSource::Close`](crate::PriceSource::Close),
/// `std_dev` = `2.0`.
pub struct BbConfigBuilder {
    length: usize,
    source: Source,
    std_dev: StdDev,
}

impl BbConfigBuilder {
    fn new() -> Self {
        Self {
            length: BbConfig::DEFAULT_LENGTH,
            source: Source::default(),
            std_dev: StdDev::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn length(mut self, length: NonZero<usize>) -> Self {
        self.length = length.get();
        self
    }

    #[inline]
    #[must_use]
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = source.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn std_dev(mut self, std_dev: StdDev) -> Self {
        self.std_dev = std_dev;
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> BbConfig {
        BbConfig {
            length: self.length,
            source: self.source,
            std_dev: self.std_dev,
        }
    }
}

/// Bollinger Bands (BB).
///
/// Three bands around an SMA of the source, offset by a configurable number
/// of population standard deviations over the same window:
///
/// ```text
/// upper  = SMA + k × σ
/// middle = SMA
/// lower  = SMA − k × σ
/// ```
///
/// Composed from its [`middle`](BbConfig::middle) and
/// [`deviation`](BbConfig::deviation) dependencies, so it carries no state
/// of its own.
impl ComputeAdapter for BbConfig {
    type State = ();

    const KIND: IndicatorKind = IndicatorKind::Bb;

    fn keys(&self) -> &'static [&'static str] {
        &["upper", "middle", "lower"]
    }

    fn outputs(&self) -> Vec<OutputMeta> {
        let overlay = self.source.is_price();
        let warmup = self.source.warmup() + self.length - 1;

        vec![
            OutputMeta::line("upper", overlay, warmup),
            OutputMeta::line("middle", overlay, warmup),
            OutputMeta::line("lower", overlay, warmup),
        ]
    }

    fn dependencies(&self) -> Vec<Computation> {
        vec![self.middle().into(), self.deviation().into()]
    }

    fn pane(&self) -> Pane {
        if self.source.is_price() {
            Pane::Price
        } else {
            Pane::Separate
        }
    }

    fn params(&self) -> Params {
        Params::new()
            .with("length", self.length)
            .with("source", self.source.clone())
            .with("std_dev", self.std_dev.value())
    }

    fn from_params(params: &Params) -> Result<Self, EngineError> {
        let mut reader = ParamReader::new(Self::KIND, params);
        let length = reader.length("length", Some(Self::DEFAULT_LENGTH))?;
        let source = reader.source()?;
        let std_dev = reader.positive("std_dev", StdDev::default().value())?;
        reader.finish()?;

        Ok(Self::builder()
            .length(length)
            .source(source)
            .std_dev(StdDev(std_dev))
            .build())
    }

    #[inline]
    fn evaluate(&self, (): &(), input: &StepInput<'_>) -> Vec<Option<Price>> {
        match (input.dep_value(0), input.dep_value(1)) {
            (Some(middle), Some(sigma)) => {
                let offset = sigma * self.std_dev.value();
                vec![Some(middle + offset), Some(middle), Some(middle - offset)]
            }
            _ => vec![None; 3],
        }
    }

    #[inline]
    fn commit(&self, (): &mut (), _input: &StepInput<'_>) {}
}

impl_canonical_display!(BbConfig);
