use crate::{EngineError, IndicatorKind, PriceSource, Source};

use std::{
    collections::BTreeMap,
    fmt::Display,
    hash::{Hash, Hasher},
    num::NonZero,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single loosely-typed indicator parameter.
///
/// Floats compare and hash by bit pattern so parameter sets can serve as
/// keys.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    #[cfg_attr(feature = "serde", serde(skip))]
    Source(Source),
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Source(a), Self::Source(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Source(v) => v.hash(state),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Source(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<PriceSource> for ParamValue {
    fn from(v: PriceSource) -> Self {
        Self::Text(v.name().to_owned())
    }
}

/// Price sources normalize to their name; only derived sources keep the
/// [`Source`] variant.
impl From<Source> for ParamValue {
    fn from(v: Source) -> Self {
        match v {
            Source::Price(price) => price.into(),
            derived @ Source::Output { .. } => Self::Source(derived),
        }
    }
}

/// Parameter map keyed by name, kept sorted for stable canonical keys.
///
/// # Example
///
/// ```
/// use quantedge_engine::Params;
///
/// let params = Params::new().with("source", "close").with("length", 12);
/// assert_eq!(params.to_string(), "length=12,source=close");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Normalizes a [`Params`] map into typed values for one indicator kind.
///
/// Every read marks its key as consumed; [`finish`](Self::finish) rejects
/// any key that was never read.
pub(crate) struct ParamReader<'a> {
    kind: IndicatorKind,
    params: &'a Params,
    consumed: Vec<&'static str>,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(kind: IndicatorKind, params: &'a Params) -> Self {
        Self {
            kind,
            params,
            consumed: Vec::new(),
        }
    }

    fn take(&mut self, key: &'static str) -> Option<&'a ParamValue> {
        self.consumed.push(key);
        self.params.get(key)
    }

    fn invalid(&self, reason: impl Into<String>) -> EngineError {
        EngineError::params(self.kind, reason)
    }

    /// Positive integer parameter; `default` of `None` makes it required.
    pub(crate) fn length(
        &mut self,
        key: &'static str,
        default: Option<usize>,
    ) -> Result<NonZero<usize>, EngineError> {
        let value = match self.take(key) {
            None => default.ok_or_else(|| self.invalid(format!("missing `{key}`")))?,
            Some(ParamValue::Int(v)) => usize::try_from(*v)
                .map_err(|_| self.invalid(format!("`{key}` must be positive, got {v}")))?,
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::float_cmp
            )]
            Some(ParamValue::Float(v)) if v.fract() == 0.0 && *v >= 0.0 && *v <= 1e15 => {
                *v as usize
            }
            Some(other) => {
                return Err(self.invalid(format!("`{key}` must be an integer, got {other}")));
            }
        };

        NonZero::new(value).ok_or_else(|| self.invalid(format!("`{key}` must be positive, got 0")))
    }

    /// Positive finite float parameter.
    pub(crate) fn positive(&mut self, key: &'static str, default: f64) -> Result<f64, EngineError> {
        #[allow(clippy::cast_precision_loss)]
        let value = match self.take(key) {
            None => default,
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f64,
            Some(other) => {
                return Err(self.invalid(format!("`{key}` must be a number, got {other}")));
            }
        };

        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(format!("`{key}` must be positive and finite, got {value}")))
        }
    }

    /// The `source` parameter, defaulting to close.
    pub(crate) fn source(&mut self) -> Result<Source, EngineError> {
        match self.take("source") {
            None => Ok(Source::default()),
            Some(ParamValue::Source(source)) => Ok(source.clone()),
            Some(ParamValue::Text(name)) => name
                .parse::<PriceSource>()
                .map(Source::from)
                .map_err(|reason| self.invalid(reason)),
            Some(other) => Err(self.invalid(format!("`source` must be a price field, got {other}"))),
        }
    }

    /// Fails on keys that the kind does not know.
    pub(crate) fn finish(self) -> Result<(), EngineError> {
        match self
            .params
            .iter()
            .find(|(key, _)| !self.consumed.iter().any(|c| c == key))
        {
            Some((key, _)) => Err(self.invalid(format!("unknown parameter `{key}`"))),
            None => Ok(()),
        }
    }
}
