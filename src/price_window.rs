use crate::Price;
use std::collections::VecDeque;

/// Committed values of a rolling window, with a running sum and, when
/// `SUM_OF_SQUARES` is set, a running sum of squares.
///
/// The window never holds a provisional value: [`peek`](Self::peek) reads
/// the sums as if one more value were pushed, without mutating.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceWindow<const SUM_OF_SQUARES: bool = false> {
    window: VecDeque<Price>,
    /// Maintained incrementally via add/subtract, may accumulate FP rounding
    /// drift over very long runs, but negligible for typical window sizes on
    /// financial data.
    sum: Price,
    sum_of_squares: f64,
}

pub type PriceWindowWithSumOfSquares = PriceWindow<true>;

/// Window sums including the value being evaluated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct WindowSums {
    pub sum: Price,
    pub sum_of_squares: f64,
}

impl<const SUM_OF_SQUARES: bool> PriceWindow<SUM_OF_SQUARES> {
    /// Sums over the last `size` values once `price` is appended, `None`
    /// while fewer than `size` values would be available.
    #[inline]
    pub(crate) fn peek(&self, price: Price, size: usize) -> Option<WindowSums> {
        if self.window.len() + 1 < size {
            return None;
        }

        let mut sum = self.sum + price;
        let mut sum_of_squares = if SUM_OF_SQUARES {
            self.sum_of_squares + price * price
        } else {
            0.0
        };

        if self.window.len() + 1 > size {
            let oldest = self.window.front().copied().expect(
                "PriceWindow invariant violation: window should hold size values when full",
            );
            sum -= oldest;
            if SUM_OF_SQUARES {
                sum_of_squares -= oldest * oldest;
            }
        }

        Some(WindowSums {
            sum,
            sum_of_squares,
        })
    }

    /// Appends a committed value, evicting the oldest beyond `size`.
    #[inline]
    pub(crate) fn push(&mut self, price: Price, size: usize) {
        if self.window.len() == size
            && let Some(oldest) = self.window.pop_front()
        {
            self.sum -= oldest;
            if SUM_OF_SQUARES {
                self.sum_of_squares -= oldest * oldest;
            }
        }

        self.window.push_back(price);
        self.sum += price;
        if SUM_OF_SQUARES {
            self.sum_of_squares += price * price;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
