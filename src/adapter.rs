use crate::{
    Bar, Computation, EngineError, IndicatorKind, IndicatorPoint, OutputMeta, Pane, Params, Price,
    PointStatus,
};

use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

/// One step of input for a computation: the bar, plus the points its
/// dependencies produced for that bar.
///
/// `deps` is positional, aligned with
/// [`ComputeAdapter::dependencies`].
#[derive(Clone, Copy, Debug)]
pub struct StepInput<'a> {
    bar: &'a Bar,
    deps: &'a [Option<&'a IndicatorPoint>],
}

impl<'a> StepInput<'a> {
    /// Input for a computation without dependencies.
    #[must_use]
    pub fn new(bar: &'a Bar) -> Self {
        Self { bar, deps: &[] }
    }

    #[must_use]
    pub fn with_deps(bar: &'a Bar, deps: &'a [Option<&'a IndicatorPoint>]) -> Self {
        Self { bar, deps }
    }

    #[inline]
    #[must_use]
    pub fn bar(&self) -> &'a Bar {
        self.bar
    }

    /// Point of dependency `slot` for this bar.
    ///
    /// `None` when the slot is empty or the point belongs to another bar.
    #[inline]
    #[must_use]
    pub fn dep(&self, slot: usize) -> Option<&'a IndicatorPoint> {
        self.deps
            .get(slot)
            .copied()
            .flatten()
            .filter(|p| p.t() == self.bar.t())
    }

    /// First output of dependency `slot`.
    #[inline]
    #[must_use]
    pub fn dep_value(&self, slot: usize) -> Option<Price> {
        self.dep(slot).and_then(IndicatorPoint::value)
    }
}

/// Computation of one indicator kind.
///
/// Implemented by the normalized config of each kind. Computation state
/// lives outside the config in [`State`](Self::State), which lets the same
/// config drive both a full recompute ([`batch`](Self::batch)) and a
/// streaming one ([`incremental`](Self::incremental)) through a single code
/// path.
///
/// Partial bars are evaluated against the committed state without touching
/// it; only final bars are committed. Replaying the same partial bar any
/// number of times therefore yields the same point, and the point of a
/// finalized bar does not depend on the partial updates that preceded it.
///
/// # Example
///
/// ```
/// use quantedge_engine::{Bar, ComputeAdapter, SmaConfig, StepInput};
/// use std::num::NonZero;
///
/// let sma = SmaConfig::close(NonZero::new(3).unwrap());
/// let bars: Vec<Bar> = (1..=5).map(|t| Bar::new(t, 0.0, 9.0, 0.0, t as f64, 0.0)).collect();
///
/// let values: Vec<_> = sma
///     .batch(bars.iter().map(StepInput::new))
///     .iter()
///     .map(|p| p.value())
///     .collect();
///
/// assert_eq!(values, [None, None, Some(2.0), Some(3.0), Some(4.0)]);
/// ```
pub trait ComputeAdapter:
    Sized + Clone + PartialEq + Eq + Hash + Display + Debug + Into<Computation>
{
    /// State carried between committed bars.
    type State: Clone + Debug + Default + PartialEq;

    const KIND: IndicatorKind;

    #[inline]
    fn kind(&self) -> IndicatorKind {
        Self::KIND
    }

    /// Output keys, in the positional order of point values.
    fn keys(&self) -> &'static [&'static str];

    /// Metadata of every output, aligned with [`keys`](Self::keys).
    fn outputs(&self) -> Vec<OutputMeta>;

    /// Leading bars before every output has a value.
    fn warmup(&self) -> usize {
        self.outputs().iter().map(|o| o.warmup).max().unwrap_or(0)
    }

    /// Computations whose points must exist before this one is evaluated.
    fn dependencies(&self) -> Vec<Computation> {
        Vec::new()
    }

    fn pane(&self) -> Pane;

    /// Normalized parameters, every default made explicit.
    fn params(&self) -> Params;

    /// Builds the config from loosely-typed parameters.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidIndicatorParams`] for missing, unknown or
    /// out-of-range parameters.
    fn from_params(params: &Params) -> Result<Self, EngineError>;

    /// Output values for `input` on top of the committed `state`.
    fn evaluate(&self, state: &Self::State, input: &StepInput<'_>) -> Vec<Option<Price>>;

    /// Advances `state` past the final bar of `input`.
    fn commit(&self, state: &mut Self::State, input: &StepInput<'_>);

    /// Evaluates one bar, committing it when final.
    fn incremental(&self, state: &mut Self::State, input: &StepInput<'_>) -> IndicatorPoint {
        let values = self.evaluate(state, input);
        let bar = input.bar();

        let status = if bar.is_final() {
            self.commit(state, input);
            PointStatus::Final
        } else {
            PointStatus::Partial
        };

        IndicatorPoint::new(bar.t(), self.keys(), values, status)
    }

    /// Evaluates a whole series from empty state.
    fn batch<'a>(&self, inputs: impl IntoIterator<Item = StepInput<'a>>) -> Vec<IndicatorPoint> {
        let mut state = Self::State::default();
        inputs
            .into_iter()
            .map(|input| self.incremental(&mut state, &input))
            .collect()
    }
}

/// Canonical `kind(params)` display shared by every config.
macro_rules! impl_canonical_display {
    ($($config:ty),+ $(,)?) => {
        $(
            impl std::fmt::Display for $config {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(
                        f,
                        "{}({})",
                        <Self as $crate::ComputeAdapter>::KIND,
                        $crate::ComputeAdapter::params(self)
                    )
                }
            }
        )+
    };
}

pub(crate) use impl_canonical_display;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        SmaConfig,
        test_util::{bar, nz},
    };

    fn point(t: u64, value: f64) -> IndicatorPoint {
        IndicatorPoint::new(t, &["value"], vec![Some(value)], PointStatus::Final)
    }

    mod step_input {
        use super::*;

        #[test]
        fn dep_matches_bar_time() {
            let b = bar(10.0, 2);
            let same = point(2, 1.5);
            let deps = [Some(&same)];
            let input = StepInput::with_deps(&b, &deps);

            assert_eq!(input.dep_value(0), Some(1.5));
            assert!(input.dep(1).is_none());
        }

        #[test]
        fn dep_from_other_bar_is_ignored() {
            let b = bar(10.0, 2);
            let stale = point(1, 1.5);
            let deps = [Some(&stale), None];
            let input = StepInput::with_deps(&b, &deps);

            assert!(input.dep(0).is_none());
            assert!(input.dep(1).is_none());
        }
    }

    mod incremental {
        use super::*;

        #[test]
        fn partial_bar_does_not_commit() {
            let sma = SmaConfig::close(nz(2));
            let mut state = <SmaConfig as ComputeAdapter>::State::default();

            sma.incremental(&mut state, &StepInput::new(&bar(10.0, 1)));
            let before = state.clone();

            let partial = bar(20.0, 2).partial();
            let first = sma.incremental(&mut state, &StepInput::new(&partial));
            let again = sma.incremental(&mut state, &StepInput::new(&partial));

            assert_eq!(state, before);
            assert_eq!(first, again);
            assert_eq!(first.value(), Some(15.0));
            assert!(!first.is_final());
        }

        #[test]
        fn final_point_ignores_earlier_partials() {
            let sma = SmaConfig::close(nz(2));
            let mut state = <SmaConfig as ComputeAdapter>::State::default();

            sma.incremental(&mut state, &StepInput::new(&bar(10.0, 1)));
            for close in [11.0, 40.0, 7.0] {
                sma.incremental(&mut state, &StepInput::new(&bar(close, 2).partial()));
            }
            let closed = sma.incremental(&mut state, &StepInput::new(&bar(30.0, 2)));

            assert_eq!(closed.value(), Some(20.0));
            assert!(closed.is_final());
        }
    }
}
