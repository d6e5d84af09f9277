use std::num::NonZero;

use crate::{
    ComputeAdapter, Computation, EngineError, IndicatorKind, OutputMeta, Pane, Params, Price,
    PriceSource, Source, StepInput, adapter::impl_canonical_display, params::ParamReader,
};

/// Configuration for the Exponential Moving Average.
///
/// # Example
///
/// ```
/// use quantedge_engine::{EmaConfig, Source, MacdLineConfig};
/// use std::num::NonZero;
///
/// let nz = |n| NonZero::new(n).unwrap();
///
/// // EMA(9) over the MACD line instead of a price field
/// let signal = EmaConfig::builder()
///     .length(nz(9))
///     .source(Source::output(MacdLineConfig::close(nz(12), nz(26)), "value"))
///     .build();
///
/// assert_eq!(signal.length(), 9);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct EmaConfig {
    length: usize,
    source: Source,
}

impl EmaConfig {
    #[must_use]
    pub fn builder() -> EmaConfigBuilder {
        EmaConfigBuilder::new()
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

    /// Smoothing factor `2 / (length + 1)`.
    #[inline]
    #[must_use]
    pub fn alpha(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let length = self.length as f64;
        2.0 / (length + 1.0)
    }

    /// EMA on closing price.
    #[must_use]
    pub fn close(length: NonZero<usize>) -> Self {
        Self::builder().length(length).build()
    }

    /// EMA on median price: `(high + low) / 2`.
    #[must_use]
    pub fn hl2(length: NonZero<usize>) -> Self {
        Self::builder()
            .length(length)
            .source(PriceSource::HL2)
            .build()
    }
}

/// Builder for [`EmaConfig`].
///
/// Defaults: source = [`PriceSource::Close`].
/// Length must be set before calling [`build`](Self::build).
pub struct EmaConfigBuilder {
    length: Option<usize>,
    source: Source,
}

impl EmaConfigBuilder {
    fn new() -> Self {
        Self {
            length: None,
            source: Source::default(),
        }
    }

    /// Sets the indicator window length.
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
    pub fn build(self) -> EmaConfig {
        EmaConfig {
            length: self.length.expect("length is required"),
            source: self.source,
        }
    }
}

/// Committed EMA state.
///
/// Collects the first `length` source values for the SMA seed, then keeps
/// only the last EMA value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmaState {
    seed_sum: f64,
    seen: usize,
    previous: Option<Price>,
}

/// Exponential Moving Average (EMA).
///
/// Uses the standard smoothing factor `α = 2 / (length + 1)`, seeded with
/// the SMA of the first `length` source values:
///
/// ```text
/// EMA = prev_EMA + α × (price − prev_EMA)
/// ```
///
/// Bars with a missing source value yield `None` and leave the state as it
/// was, so the series resumes from the last committed EMA.
impl ComputeAdapter for EmaConfig {
    type State = EmaState;

    const KIND: IndicatorKind = IndicatorKind::Ema;

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

    fn dependencies(&self) -> Vec<Computation> {
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
    fn evaluate(&self, state: &EmaState, input: &StepInput<'_>) -> Vec<Option<Price>> {
        let value = self.source.read(input).and_then(|price| match state.previous {
            Some(previous) => Some(self.alpha().mul_add(price - previous, previous)),
            #[allow(clippy::cast_precision_loss)]
            None if state.seen + 1 == self.length => {
                Some((state.seed_sum + price) / self.length as f64)
            }
            None => None,
        });

        vec![value]
    }

    #[inline]
    fn commit(&self, state: &mut EmaState, input: &StepInput<'_>) {
        let Some(price) = self.source.read(input) else {
            return;
        };

        state.previous = match state.previous {
            Some(previous) => Some(self.alpha().mul_add(price - previous, previous)),
            None => {
                state.seed_sum += price;
                state.seen += 1;
                #[allow(clippy::cast_precision_loss)]
                let length = self.length as f64;
                (state.seen == self.length).then(|| state.seed_sum / length)
            }
        };
    }
}

impl_canonical_display!(EmaConfig);
