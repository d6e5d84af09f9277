use std::num::NonZero;

use crate::{
    ComputeAdapter, Computation, EmaConfig, EngineError, IndicatorKind, OutputMeta, Pane, Params,
    Price, Source, StepInput, adapter::impl_canonical_display, params::ParamReader,
};

/// The MACD line on its own: `EMA(fast) − EMA(slow)`.
///
/// Exists as a separate computation so that the signal line can be an
/// ordinary EMA over its `value` output, shared like any other EMA.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct MacdLineConfig {
    fast: usize,
    slow: usize,
    source: Source,
}

impl MacdLineConfig {
    /// MACD line on closing price.
    ///
    /// # Panics
    ///
    /// Panics unless `fast < slow`.
    #[must_use]
    pub fn close(fast: NonZero<usize>, slow: NonZero<usize>) -> Self {
        Self::new(fast, slow, Source::default())
    }

    /// # Panics
    ///
    /// Panics unless `fast < slow`.
    #[must_use]
    pub fn new(fast: NonZero<usize>, slow: NonZero<usize>, source: impl Into<Source>) -> Self {
        assert!(fast < slow, "fast length must be below slow length");
        Self {
            fast: fast.get(),
            slow: slow.get(),
            source: source.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn fast(&self) -> usize {
        self.fast
    }

    #[inline]
    #[must_use]
    pub fn slow(&self) -> usize {
        self.slow
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    fn ema(&self, length: usize) -> EmaConfig {
        EmaConfig::builder()
            .length(NonZero::new(length).expect("MacdLineConfig invariant violation: length is positive"))
            .source(self.source.clone())
            .build()
    }
}

impl ComputeAdapter for MacdLineConfig {
    type State = ();

    const KIND: IndicatorKind = IndicatorKind::MacdLine;

    fn keys(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn outputs(&self) -> Vec<OutputMeta> {
        vec![OutputMeta::line(
            "value",
            false,
            self.source.warmup() + self.slow - 1,
        )]
    }

    fn dependencies(&self) -> Vec<Computation> {
        vec![self.ema(self.fast).into(), self.ema(self.slow).into()]
    }

    fn pane(&self) -> Pane {
        Pane::Separate
    }

    fn params(&self) -> Params {
        Params::new()
            .with("fast", self.fast)
            .with("slow", self.slow)
            .with("source", self.source.clone())
    }

    fn from_params(params: &Params) -> Result<Self, EngineError> {
        let mut reader = ParamReader::new(Self::KIND, params);
        let fast = reader.length("fast", None)?;
        let slow = reader.length("slow", None)?;
        let source = reader.source()?;
        reader.finish()?;

        check_lengths(Self::KIND, fast, slow)?;
        Ok(Self::new(fast, slow, source))
    }

    #[inline]
    fn evaluate(&self, (): &(), input: &StepInput<'_>) -> Vec<Option<Price>> {
        let line = input
            .dep_value(0)
            .zip(input.dep_value(1))
            .map(|(fast, slow)| fast - slow);

        vec![line]
    }

    #[inline]
    fn commit(&self, (): &mut (), _input: &StepInput<'_>) {}
}

/// Configuration for MACD.
///
/// # Example
///
/// ```
/// use quantedge_engine::{ComputeAdapter, MacdConfig};
///
/// let macd = MacdConfig::default();
/// assert_eq!(macd.to_string(), "macd(fast=12,signal=9,slow=26,source=close)");
///
/// // macd line ready after 26 bars, signal and histogram after 34
/// let warmups: Vec<_> = macd.outputs().iter().map(|o| o.warmup).collect();
/// assert_eq!(warmups, [25, 33, 33]);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct MacdConfig {
    line: MacdLineConfig,
    signal: usize,
}

impl MacdConfig {
    pub const DEFAULT_FAST: usize = 12;
    pub const DEFAULT_SLOW: usize = 26;
    pub const DEFAULT_SIGNAL: usize = 9;

    #[must_use]
    pub fn builder() -> MacdConfigBuilder {
        MacdConfigBuilder::new()
    }

    #[inline]
    #[must_use]
    pub fn fast(&self) -> usize {
        self.line.fast
    }

    #[inline]
    #[must_use]
    pub fn slow(&self) -> usize {
        self.line.slow
    }

    #[inline]
    #[must_use]
    pub fn signal(&self) -> usize {
        self.signal
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.line.source
    }

    /// The MACD line this config is built on.
    #[must_use]
    pub fn line(&self) -> &MacdLineConfig {
        &self.line
    }

    /// EMA of the MACD line.
    #[must_use]
    pub fn signal_line(&self) -> EmaConfig {
        EmaConfig::builder()
            .length(NonZero::new(self.signal).expect("MacdConfig invariant violation: signal is positive"))
            .source(Source::output(self.line.clone(), "value"))
            .build()
    }
}

/// MACD(12, 26, 9) on closing price.
impl Default for MacdConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`MacdConfig`].
///
/// Defaults: fast = 12, slow = 26, signal = 9,
/// source = [`PriceSource::Close`](crate::PriceSource::Close).
pub struct MacdConfigBuilder {
    fast: usize,
    slow: usize,
    signal: usize,
    source: Source,
}

impl MacdConfigBuilder {
    fn new() -> Self {
        Self {
            fast: MacdConfig::DEFAULT_FAST,
            slow: MacdConfig::DEFAULT_SLOW,
            signal: MacdConfig::DEFAULT_SIGNAL,
            source: Source::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn fast(mut self, fast: NonZero<usize>) -> Self {
        self.fast = fast.get();
        self
    }

    #[inline]
    #[must_use]
    pub fn slow(mut self, slow: NonZero<usize>) -> Self {
        self.slow = slow.get();
        self
    }

    #[inline]
    #[must_use]
    pub fn signal(mut self, signal: NonZero<usize>) -> Self {
        self.signal = signal.get();
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
    /// Panics unless `fast < slow`.
    #[inline]
    #[must_use]
    pub fn build(self) -> MacdConfig {
        assert!(self.fast < self.slow, "fast length must be below slow length");
        MacdConfig {
            line: MacdLineConfig {
                fast: self.fast,
                slow: self.slow,
                source: self.source,
            },
            signal: self.signal,
        }
    }
}

/// Moving Average Convergence Divergence.
///
/// ```text
/// macd      = EMA(fast) − EMA(slow)
/// signal    = EMA(signal) of macd
/// histogram = macd − signal
/// ```
///
/// Depends on both EMAs and the signal EMA, which in turn depends on the
/// MACD line. Nothing is computed twice: all four resolve to shared
/// computations.
impl ComputeAdapter for MacdConfig {
    type State = ();

    const KIND: IndicatorKind = IndicatorKind::Macd;

    fn keys(&self) -> &'static [&'static str] {
        &["macd", "signal", "histogram"]
    }

    fn outputs(&self) -> Vec<OutputMeta> {
        let line = self.line.outputs()[0].warmup;
        let signal = line + self.signal - 1;

        vec![
            OutputMeta::line("macd", false, line),
            OutputMeta::line("signal", false, signal),
            OutputMeta::histogram("histogram", signal),
        ]
    }

    fn dependencies(&self) -> Vec<Computation> {
        vec![
            self.line.ema(self.line.fast).into(),
            self.line.ema(self.line.slow).into(),
            self.signal_line().into(),
        ]
    }

    fn pane(&self) -> Pane {
        Pane::Separate
    }

    fn params(&self) -> Params {
        self.line.params().with("signal", self.signal)
    }

    fn from_params(params: &Params) -> Result<Self, EngineError> {
        let mut reader = ParamReader::new(Self::KIND, params);
        let fast = reader.length("fast", Some(Self::DEFAULT_FAST))?;
        let slow = reader.length("slow", Some(Self::DEFAULT_SLOW))?;
        let signal = reader.length("signal", Some(Self::DEFAULT_SIGNAL))?;
        let source = reader.source()?;
        reader.finish()?;

        check_lengths(Self::KIND, fast, slow)?;
        Ok(Self::builder()
            .fast(fast)
            .slow(slow)
            .signal(signal)
            .source(source)
            .build())
    }

    #[inline]
    fn evaluate(&self, (): &(), input: &StepInput<'_>) -> Vec<Option<Price>> {
        let macd = input
            .dep_value(0)
            .zip(input.dep_value(1))
            .map(|(fast, slow)| fast - slow);
        let signal = input.dep_value(2);
        let histogram = macd.zip(signal).map(|(m, s)| m - s);

        vec![macd, signal, histogram]
    }

    #[inline]
    fn commit(&self, (): &mut (), _input: &StepInput<'_>) {}
}

fn check_lengths(
    kind: IndicatorKind,
    fast: NonZero<usize>,
    slow: NonZero<usize>,
) -> Result<(), EngineError> {
    if fast < slow {
        Ok(())
    } else {
        Err(EngineError::params(
            kind,
            format!("`fast` ({fast}) must be below `slow` ({slow})"),
        ))
    }
}

impl_canonical_display!(MacdLineConfig, MacdConfig);
