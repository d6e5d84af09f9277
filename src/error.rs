use crate::{IndicatorKind, InstanceId, SpecId, Timeframe, Timestamp};

use thiserror::Error;

/// Errors reported by the engine.
///
/// Registration errors leave the context untouched: no instance is created
/// and no reference count changes. Ingestion errors reject the bar before any
/// buffer is mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("ring buffer capacity must be positive")]
    InvalidCapacity,

    #[error("invalid parameters for {kind}: {reason}")]
    InvalidIndicatorParams { kind: IndicatorKind, reason: String },

    #[error("cyclic dependency through {spec}")]
    CyclicDependency { spec: String },

    #[error("unknown canonical spec: {0}")]
    UnknownCanonicalSpec(SpecId),

    #[error("unknown indicator instance: {0}")]
    UnknownInstance(InstanceId),

    #[error("out of order bar: t={t} is not after finalized t={last}")]
    OutOfOrderBar { t: Timestamp, last: Timestamp },

    #[error("invalid bar at t={t}: {reason}")]
    InvalidBar { t: Timestamp, reason: &'static str },

    #[error("timeframe mismatch: context runs on {expected}, got {got}")]
    TimeframeMismatch { expected: Timeframe, got: Timeframe },
}

impl EngineError {
    pub(crate) fn params(kind: IndicatorKind, reason: impl Into<String>) -> Self {
        Self::InvalidIndicatorParams {
            kind,
            reason: reason.into(),
        }
    }
}
