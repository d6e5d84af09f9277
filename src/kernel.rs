use crate::{
    BbConfig, Computation, ComputeAdapter, DeviationConfig, EmaConfig, EmaState, IndicatorPoint,
    MacdConfig, MacdLineConfig, RsiConfig, RsiState, SmaConfig, StepInput,
    deviation::DeviationState, sma::SmaState,
};

/// A computation bound to its running state.
///
/// One per registered canonical spec. Static dispatch over the closed set of
/// kinds keeps the hot path free of trait objects.
#[derive(Clone, Debug)]
pub(crate) enum Kernel {
    Sma(SmaConfig, SmaState),
    Ema(EmaConfig, EmaState),
    Rsi(RsiConfig, RsiState),
    Deviation(DeviationConfig, DeviationState),
    MacdLine(MacdLineConfig),
    Macd(MacdConfig),
    Bb(BbConfig),
}

impl Kernel {
    pub(crate) fn new(computation: &Computation) -> Self {
        match computation.clone() {
            Computation::Sma(c) => Self::Sma(c, SmaState::default()),
            Computation::Ema(c) => Self::Ema(c, EmaState::default()),
            Computation::Rsi(c) => Self::Rsi(c, RsiState::default()),
            Computation::Deviation(c) => Self::Deviation(c, DeviationState::default()),
            Computation::MacdLine(c) => Self::MacdLine(c),
            Computation::Macd(c) => Self::Macd(c),
            Computation::Bb(c) => Self::Bb(c),
        }
    }

    /// Evaluates one bar, committing it when final.
    #[inline]
    pub(crate) fn incremental(&mut self, input: &StepInput<'_>) -> IndicatorPoint {
        match self {
            Self::Sma(c, s) => c.incremental(s, input),
            Self::Ema(c, s) => c.incremental(s, input),
            Self::Rsi(c, s) => c.incremental(s, input),
            Self::Deviation(c, s) => c.incremental(s, input),
            Self::MacdLine(c) => c.incremental(&mut (), input),
            Self::Macd(c) => c.incremental(&mut (), input),
            Self::Bb(c) => c.incremental(&mut (), input),
        }
    }

    /// Drops all committed state.
    pub(crate) fn reset(&mut self) {
        match self {
            Self::Sma(_, s) => *s = SmaState::default(),
            Self::Ema(_, s) => *s = EmaState::default(),
            Self::Rsi(_, s) => *s = RsiState::default(),
            Self::Deviation(_, s) => *s = DeviationState::default(),
            Self::MacdLine(_) | Self::Macd(_) | Self::Bb(_) => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::test_util::{bars, nz};

    #[test]
    fn matches_adapter_batch() {
        let config = SmaConfig::close(nz(2));
        let bars = bars(&[1.0, 3.0, 5.0]);
        let mut kernel = Kernel::new(&config.clone().into());

        let streamed: Vec<_> = bars
            .iter()
            .map(|b| kernel.incremental(&StepInput::new(b)))
            .collect();

        assert_eq!(streamed, config.batch(bars.iter().map(StepInput::new)));
    }

    #[test]
    fn reset_forgets_history() {
        let mut kernel = Kernel::new(&EmaConfig::close(nz(2)).into());
        let bars = bars(&[10.0, 20.0]);
        for b in &bars {
            kernel.incremental(&StepInput::new(b));
        }

        kernel.reset();
        let point = kernel.incremental(&StepInput::new(&bars[0]));
        assert_eq!(point.value(), None);
    }
}
