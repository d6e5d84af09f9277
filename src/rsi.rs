use std::num::NonZero;

use crate::{
    ComputeAdapter, Computation, EngineError, IndicatorKind, OutputMeta, Pane, Params, Price,
    Source, StepInput, adapter::impl_canonical_display, params::ParamReader,
};

/// Configuration for the Relative Strength Index.
///
/// RSI uses Wilder's smoothing, which has infinite memory: the SMA seed
/// (first `length` price changes) influences all subsequent values. Output
/// begins at bar `length + 1`.
///
/// # Example
///
/// ```
/// use quantedge_engine::{ComputeAdapter, RsiConfig};
///
/// let config = RsiConfig::default();
/// assert_eq!(config.length(), 14);
/// assert_eq!(config.warmup(), 14);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct RsiConfig {
    length: usize,
    source: Source,
}

impl RsiConfig {
    pub const DEFAULT_LENGTH: usize = 14;

    #[must_use]
    pub fn builder() -> RsiConfigBuilder {
        RsiConfigBuilder::new()
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

    /// RSI on closing price.
    #[must_use]
    pub fn close(length: NonZero<usize>) -> Self {
        Self::builder().length(length).build()
    }
}

/// RSI(14) on closing price.
impl Default for RsiConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`RsiConfig`].
///
/// Defaults: length = 14, source = [`PriceSource::Close`](crate::PriceSource::Close).
pub struct RsiConfigBuilder {
    length: usize,
    source: Source,
}

impl RsiConfigBuilder {
    #[must_use]
    fn new() -> Self {
        Self {
            length: RsiConfig::DEFAULT_LENGTH,
            source: Source::default(),
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
    pub fn build(self) -> RsiConfig {
        RsiConfig {
            length: self.length,
            source: self.source,
        }
    }
}

/// Committed RSI state.
///
/// Sums the first `length` gains and losses for the SMA seed, then keeps
/// only the smoothed averages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RsiState {
    prev_price: Option<Price>,
    seen_changes: usize,
    sum_gain: f64,
    sum_loss: f64,
    averages: Option<(f64, f64)>,
}

/// Relative Strength Index (RSI) with Wilder's smoothing.
///
/// Measures the speed and magnitude of recent price changes on a 0–100
/// scale. The first `length` price changes are averaged with a simple mean
/// (SMA seed). After seeding, gains and losses are smoothed with Wilder's
/// method (`α = 1 / length`):
///
/// ```text
/// avg_gain = (prev_avg_gain × (length − 1) + gain) / length
/// avg_loss = (prev_avg_loss × (length − 1) + loss) / length
/// RSI      = 100 × avg_gain / (avg_gain + avg_loss)
/// ```
///
/// A flat window (no gains, no losses) reads 50.
impl ComputeAdapter for RsiConfig {
    type State = RsiState;

    const KIND: IndicatorKind = IndicatorKind::Rsi;

    fn keys(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn outputs(&self) -> Vec<OutputMeta> {
        vec![OutputMeta::line(
            "value",
            false,
            self.source.warmup() + self.length,
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
        let length = reader.length("length", Some(Self::DEFAULT_LENGTH))?;
        let source = reader.source()?;
        reader.finish()?;

        Ok(Self::builder().length(length).source(source).build())
    }

    #[inline]
    fn evaluate(&self, state: &RsiState, input: &StepInput<'_>) -> Vec<Option<Price>> {
        let value = self
            .source
            .read(input)
            .zip(state.prev_price)
            .and_then(|(price, prev_price)| {
                let (gain, loss) = gain_and_loss(prev_price, price);
                match state.averages {
                    Some((avg_gain, avg_loss)) => Some(self.smooth(avg_gain, avg_loss, gain, loss)),
                    None if state.seen_changes + 1 == self.length => Some((
                        (state.sum_gain + gain) * self.length_reciprocal(),
                        (state.sum_loss + loss) * self.length_reciprocal(),
                    )),
                    None => None,
                }
            })
            .map(|(avg_gain, avg_loss)| rsi_from_averages(avg_gain, avg_loss));

        vec![value]
    }

    #[inline]
    fn commit(&self, state: &mut RsiState, input: &StepInput<'_>) {
        let Some(price) = self.source.read(input) else {
            return;
        };

        if let Some(prev_price) = state.prev_price {
            let (gain, loss) = gain_and_loss(prev_price, price);

            state.averages = match state.averages {
                Some((avg_gain, avg_loss)) => Some(self.smooth(avg_gain, avg_loss, gain, loss)),
                None => {
                    state.sum_gain += gain;
                    state.sum_loss += loss;
                    state.seen_changes += 1;
                    (state.seen_changes == self.length).then(|| {
                        (
                            state.sum_gain * self.length_reciprocal(),
                            state.sum_loss * self.length_reciprocal(),
                        )
                    })
                }
            };
        }

        state.prev_price = Some(price);
    }
}

impl RsiConfig {
    #[inline]
    fn length_reciprocal(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let length = self.length as f64;
        1.0 / length
    }

    #[inline]
    fn smooth(&self, avg_gain: f64, avg_loss: f64, gain: f64, loss: f64) -> (f64, f64) {
        #[allow(clippy::cast_precision_loss)]
        let length_minus_one = (self.length - 1) as f64;
        let reciprocal = self.length_reciprocal();

        (
            avg_gain.mul_add(length_minus_one, gain) * reciprocal,
            avg_loss.mul_add(length_minus_one, loss) * reciprocal,
        )
    }
}

#[inline]
fn gain_and_loss(prev_price: Price, price: Price) -> (Price, Price) {
    let change = price - prev_price;
    let gain = change.max(0.0);
    let loss = (-change).max(0.0);

    (gain, loss)
}

#[inline]
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let sum = avg_gain + avg_loss;
    if sum == 0.0 {
        50.0
    } else {
        100.0 * avg_gain / sum
    }
}

impl_canonical_display!(RsiConfig);
