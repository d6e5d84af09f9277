use std::num::NonZero;

use crate::{
    ComputeAdapter, Computation, EngineError, IndicatorKind, OutputMeta, Pane, Params, Price,
    Source, StepInput, adapter::impl_canonical_display, params::ParamReader,
    price_window::PriceWindowWithSumOfSquares,
};

/// Configuration for the rolling standard deviation.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct DeviationConfig {
    length: usize,
    source: Source,
}

impl DeviationConfig {
    #[must_use]
    pub fn builder() -> DeviationConfigBuilder {
        DeviationConfigBuilder::new()
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

    /// Standard deviation of closing prices.
    #[must_use]
    pub fn close(length: NonZero<usize>) -> Self {
        Self::builder().length(length).build()
    }
}

/// Builder for [`DeviationConfig`].
///
/// Defaults: source = [`PriceSource::Close`](crate::PriceSource::Close).
/// Length must be set before calling [`build`](Self::build).
pub struct DeviationConfigBuilder {
    length: Option<usize>,
    source: Source,
}

impl DeviationConfigBuilder {
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

    /// # Panics
    ///
    /// Panics if the length was never set.
    #[inline]
    #[must_use]
    pub fn build(self) -> DeviationConfig {
        DeviationConfig {
            length: self.length.expect("length is required"),
            source: self.source,
        }
    }
}

pub type DeviationState = PriceWindowWithSumOfSquares;

/// Population standard deviation of the last *n* source values.
///
/// ```text
/// σ = √(Σx² / n − (Σx / n)²)
/// ```
///
/// Negative variance from rounding is clamped to zero.
impl ComputeAdapter for DeviationConfig {
    type State = DeviationState;

    const KIND: IndicatorKind = IndicatorKind::Deviation;

    fn keys(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn outputs(&self) -> Vec<OutputMeta> {
        vec![OutputMeta::line(
            "value",
            false,
            self.source.warmup() + self.length - 1,
        )]
    }

    fn dependencies(&self) -> Vec<Computation> {
        self.source.dependencies()
    }

    fn pane(&self) -> Pane {
        Pane::Separate
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
    fn evaluate(&self, state: &DeviationState, input: &StepInput<'_>) -> Vec<Option<Price>> {
        #[allow(clippy::cast_precision_loss)]
        let length_reciprocal = 1.0 / self.length as f64;

        let value = self
            .source
            .read(input)
            .and_then(|price| state.peek(price, self.length))
            .map(|sums| {
                let mean = sums.sum * length_reciprocal;
                let variance = sums.sum_of_squares * length_reciprocal - mean * mean;
                variance.max(0.0).sqrt()
            });

        vec![value]
    }

    #[inline]
    fn commit(&self, state: &mut DeviationState, input: &StepInput<'_>) {
        if let Some(price) = self.source.read(input) {
            state.push(price, self.length);
        }
    }
}

impl_canonical_display!(DeviationConfig);
