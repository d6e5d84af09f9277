use crate::{Price, Timestamp};

use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a point is provisional or committed.
///
/// Mirrors the bar that produced it: a partial bar yields a `Partial` point
/// that is replaced once the bar finalizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PointStatus {
    Partial,
    Final,
}

/// Output of one computation for one bar.
///
/// Maps each output key of the computation to its value, `None` during
/// warmup or when a required input is missing.
///
/// # Example
///
/// ```
/// use quantedge_engine::{IndicatorPoint, PointStatus};
///
/// let point = IndicatorPoint::new(
///     60,
///     &["macd", "signal", "histogram"],
///     vec![Some(1.5), None, None],
///     PointStatus::Final,
/// );
///
/// assert_eq!(point.get("macd"), Some(1.5));
/// assert_eq!(point.get("signal"), None);
/// assert_eq!(point.get("missing"), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IndicatorPoint {
    t: Timestamp,
    keys: &'static [&'static str],
    values: Vec<Option<Price>>,
    status: PointStatus,
}

impl IndicatorPoint {
    /// Creates a point. `values` are positional, aligned with `keys`.
    #[must_use]
    pub fn new(
        t: Timestamp,
        keys: &'static [&'static str],
        values: Vec<Option<Price>>,
        status: PointStatus,
    ) -> Self {
        debug_assert_eq!(keys.len(), values.len(), "one value per output key");
        Self {
            t,
            keys,
            values,
            status,
        }
    }

    #[inline]
    #[must_use]
    pub fn t(&self) -> Timestamp {
        self.t
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> PointStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status == PointStatus::Final
    }

    /// Value of output `key`, `None` when null or when the key is unknown.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Price> {
        self.keys
            .iter()
            .position(|k| *k == key)
            .and_then(|i| self.values[i])
    }

    /// Value of the first output. Convenient for single-output indicators.
    #[must_use]
    pub fn value(&self) -> Option<Price> {
        self.values.first().copied().flatten()
    }

    /// Output keys in declaration order.
    #[must_use]
    pub fn keys(&self) -> &'static [&'static str] {
        self.keys
    }

    /// Positional values, aligned with [`keys`](Self::keys).
    #[must_use]
    pub fn values(&self) -> &[Option<Price>] {
        &self.values
    }

    /// `(key, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<Price>)> + '_ {
        self.keys.iter().copied().zip(self.values.iter().copied())
    }

    /// `true` when every output has a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

impl Display for IndicatorPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Point(t: {}", self.t)?;
        for (key, value) in self.iter() {
            match value {
                Some(v) => write!(f, ", {key}: {v}")?,
                None => write!(f, ", {key}: null")?,
            }
        }
        if self.status == PointStatus::Partial {
            write!(f, ", partial")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANDS: &[&str] = &["upper", "middle", "lower"];

    fn bands(status: PointStatus) -> IndicatorPoint {
        IndicatorPoint::new(5, BANDS, vec![Some(3.0), Some(2.0), Some(1.0)], status)
    }

    #[test]
    fn looks_up_by_key() {
        let point = bands(PointStatus::Final);
        assert_eq!(point.get("lower"), Some(1.0));
        assert_eq!(point.value(), Some(3.0));
        assert_eq!(point.get("width"), None);
    }

    #[test]
    fn iterates_in_declaration_order() {
        let point = bands(PointStatus::Final);
        let keys: Vec<_> = point.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, BANDS);
    }

    #[test]
    fn completeness_requires_all_values() {
        assert!(bands(PointStatus::Final).is_complete());
        let warm = IndicatorPoint::new(1, &["value"], vec![None], PointStatus::Final);
        assert!(!warm.is_complete());
        assert_eq!(warm.value(), None);
    }

    #[test]
    fn status_flags() {
        assert!(!bands(PointStatus::Partial).is_final());
        assert!(bands(PointStatus::Final).is_final());
        assert_eq!(bands(PointStatus::Partial).status(), PointStatus::Partial);
    }

    #[test]
    fn display_lists_outputs() {
        let point = IndicatorPoint::new(9, &["value"], vec![None], PointStatus::Partial);
        assert_eq!(point.to_string(), "Point(t: 9, value: null, partial)");
        assert_eq!(
            bands(PointStatus::Final).to_string(),
            "Point(t: 5, upper: 3, middle: 2, lower: 1)"
        );
    }
}
