use std::num::NonZero;

use crate::{
    ComputeAdapter, EngineError, IndicatorKind, OutputMeta, Pane, Params, Price, PriceSource,
    Source, StepInput, adapter::impl_canonical_display, params::ParamReader,
    price_window::PriceWindow,
};

/// Configuration for the Simple Moving Average.
///
/// # Example
///
/// ```rust
/// use quantedge_engine::SmaConfig;
/// use std::num::NonZero;
///
/// let config = SmaConfig::close(NonZero::new(20).unwrap());
/// assert_eq!(config.length(), 20);
/// assert_eq!(config.to_string(), "sma(length=20,source=close)");
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct SmaConfig {
    length: usize,
    source: Source,
}

impl SmaConfig {
    #[must_use]
    pub fn builder() -> SmaConfigBuilder {
        SmaConfigBuilder::new()
    }

    /// Window length (number of bars).
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

    /// SMA on closing price.
    #[must_use]
    pub fn close(length: NonZero<usize>) -> Self {
        Self::builder().length(length).build()
    }

    /// SMA on median price: `(high + low) / 2`.
    #[must_use]
    pub fn hl2(length: NonZero<usize>) -> Self {
        Self::builder()
            .length(length)
            .source(PriceSource::HL2)
            .build()
    }

    /// SMA on average price: `(open + high + low + close) / 4`.
    #[must_use]
    pub fn ohlc4(length: NonZero<usize>) -> Self {
        Self::builder()
            .length(length)
            .source(PriceSource::OHLC4)
            .build()
    }
}

/// Builder for [`SmaConfig`].
///
/// Defaults: source = [`PriceSource::Close`].
/// Length must be set before calling [`build`](Self::build).
pub struct SmaConfigBuilder {
    length: Option<usize>,
    source: Source,
}

impl SmaConfigBuilder {
    fn new() -> Self {
        Self {
            length: None,
            source: Source::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn length(mut self, length: NonZero<usize>) -> Self {
        self.length.replace(length.get());
        self
    }

    #[inline]
    #[must_use]
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = source.into();
        self
    }

    /// Builds the config.
    ///
    /// # Panics
    ///
    /// Panics if the length was never set.
    #[inline]
    #[must_use]
    pub fn build(self) -> SmaConfig {
        SmaConfig {
            length: self.length.expect("length is required"),
            source: self.source,
        }
    }
}

/// Committed SMA state: the last `length` source values and their sum.
pub type SmaState = PriceWindow;

/// Simple Moving Average (SMA).
///
/// Unweighted mean of the last *n* source values. `None` until the window
/// is full, and for any bar whose source value is missing.
///
/// Uses a running sum for O(1) updates per bar.
impl ComputeAdapter for SmaConfig {
    type State = SmaState;

    const KIND: IndicatorKind = IndicatorKind::Sma;

    fn keys(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn outputs(&self) -> Vec<OutputMeta> {
        vec![OutputMeta::line(
            "value",
            self.source.is_price(),
            self.source.warmup() + self.length - 1,
        )]
    }

    fn dependencies(&self) -> Vec<crate::Computation> {
        self.source.dependencies()
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
    }

    fn from_params(params: &Params) -> Result<Self, EngineError> {
        let mut reader = ParamReader::new(Self::KIND, params);
        let length = reader.length("length", None)?;
        let source = reader.source()?;
        reader.finish()?;

        Ok(Self::builder().length(length).source(source).build())
    }

    #[inline]
    fn evaluate(&self, state: &SmaState, input: &StepInput<'_>) -> Vec<Option<Price>> {
        #[allow(clippy::cast_precision_loss)]
        let value = self
            .source
            .read(input)
            .and_then(|price| state.peek(price, self.length))
            .map(|sums| sums.sum / self.length as f64);

        vec![value]
    }

    #[inline]
    fn commit(&self, state: &mut SmaState, input: &StepInput<'_>) {
        if let Some(price) = self.source.read(input) {
            state.push(price, self.length);
        }
    }
}

impl_canonical_display!(SmaConfig);
