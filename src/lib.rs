//! Incremental technical indicator engine for streaming OHLCV bars.
//!
//! An [`EngineContext`] owns a bounded bar history, a deduplicated graph of
//! canonical computations and the update bus. Indicators are registered from
//! typed configs ([`SmaConfig`], [`MacdConfig`], ...) or from loosely-typed
//! [`Params`]; identical computations are shared by canonical id, so two
//! instances asking for `ema(length=12,source=close)@1m` read one buffer.
//!
//! Bars may be delivered as partial while their period is open. Partial bars
//! produce provisional points and never advance committed state; the final
//! delivery of the same timestamp commits it exactly once.
//!
//! ```
//! use quantedge_engine::{Bar, EngineConfig, EngineContext, SmaConfig, Timeframe};
//! use std::num::NonZero;
//!
//! let mut ctx = EngineContext::new(EngineConfig::builder().capacity(500).build()?);
//! let sma = ctx.register(SmaConfig::close(NonZero::new(3).unwrap()), Timeframe::minutes(1))?;
//!
//! for (t, close) in (0u64..).zip([1.0, 2.0, 3.0, 4.0]) {
//!     ctx.add_bar(Bar::new(t * 60, close, close, close, close, 0.0))?;
//! }
//!
//! let last = ctx.latest_indicator_points(sma, 1)?;
//! assert_eq!(last[0].value(), Some(3.0));
//! # Ok::<(), quantedge_engine::EngineError>(())
//! ```
//!
//! Every kind also implements [`ComputeAdapter`], which exposes `batch` and
//! `incremental` directly for use without an engine.

mod adapter;
mod bb;
mod bus;
mod deviation;
mod ema;
mod engine;
mod error;
mod kernel;
mod macd;
mod ohlcv;
mod params;
mod point;
mod price_source;
mod price_window;
mod resolver;
mod ring_buffer;
mod rsi;
mod series;
mod sma;
mod spec;

pub use crate::adapter::{ComputeAdapter, StepInput};
pub use crate::bus::{IndicatorBus, IndicatorUpdate, SubscriptionHandle};
pub use crate::engine::{
    EngineConfig, EngineConfigBuilder, EngineContext, IndicatorInstance, InstanceId,
};
pub use crate::error::EngineError;
pub use crate::ohlcv::{Bar, Ohlcv, Price, Timestamp};
pub use crate::params::{ParamValue, Params};
pub use crate::point::{IndicatorPoint, PointStatus};
pub use crate::price_source::{PriceSource, Source};
pub use crate::ring_buffer::RingBuffer;
pub use crate::series::SeriesState;
pub use crate::spec::{
    CanonicalSpec, Computation, IndicatorKind, OutputMeta, OutputStyle, Pane, SpecId, Timeframe,
};

pub use crate::bb::{BbConfig, BbConfigBuilder, StdDev};
pub use crate::deviation::{DeviationConfig, DeviationConfigBuilder, DeviationState};
pub use crate::ema::{EmaConfig, EmaConfigBuilder, EmaState};
pub use crate::macd::{MacdConfig, MacdConfigBuilder, MacdLineConfig};
pub use crate::rsi::{RsiConfig, RsiConfigBuilder, RsiState};
pub use crate::sma::{SmaConfig, SmaConfigBuilder, SmaState};

#[cfg(test)]
mod test_util;
