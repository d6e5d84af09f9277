use crate::EngineError;

use std::num::NonZero;

/// Fixed-capacity circular buffer.
///
/// Pushing into a full buffer overwrites the oldest element. Iteration and
/// materialization are always oldest-to-newest.
///
/// # Example
///
/// ```
/// use quantedge_engine::RingBuffer;
///
/// let mut rb = RingBuffer::new(3).unwrap();
/// for i in 1..=5 {
///     rb.push(i);
/// }
///
/// assert_eq!(rb.to_vec(), vec![3, 4, 5]);
/// assert_eq!(rb.peek(), Some(&5));
/// assert_eq!(rb.peek_oldest(), Some(&3));
/// ```
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<Option<T>>,
    /// Slot of the oldest element.
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        NonZero::new(capacity)
            .map(Self::with_capacity)
            .ok_or(EngineError::InvalidCapacity)
    }

    /// Infallible constructor for an already validated capacity.
    #[must_use]
    pub fn with_capacity(capacity: NonZero<usize>) -> Self {
        let mut buffer = Vec::with_capacity(capacity.get());
        buffer.resize_with(capacity.get(), || None);

        Self {
            buffer,
            head: 0,
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    fn slot(&self, offset: usize) -> usize {
        let slot = self.head + offset;
        if slot >= self.capacity() {
            slot - self.capacity()
        } else {
            slot
        }
    }

    /// Appends `item`, evicting and returning the oldest element when full.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.is_full() {
            let old = self.buffer[self.head].replace(item);

            self.head += 1;
            if self.head == self.capacity() {
                self.head = 0;
            }

            old
        } else {
            let tail = self.slot(self.len);
            self.buffer[tail] = Some(item);
            self.len += 1;

            None
        }
    }

    /// Removes and returns the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let old = self.buffer[self.head].take();
        self.head = self.slot(1);
        self.len -= 1;

        old
    }

    /// Overwrites the newest element, returning the previous value.
    ///
    /// Returns `Err(item)` when the buffer is empty.
    ///
    /// # Errors
    ///
    /// Hands `item` back when there is nothing to replace.
    pub fn replace_last(&mut self, item: T) -> Result<T, T> {
        if self.is_empty() {
            return Err(item);
        }

        let tail = self.slot(self.len - 1);
        Ok(self.buffer[tail]
            .replace(item)
            .expect("RingBuffer invariant violation: occupied slot is empty"))
    }

    /// Newest element.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Mutable access to the newest element.
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        let last = self.len.checked_sub(1)?;
        let slot = self.slot(last);
        self.buffer[slot].as_mut()
    }

    /// Oldest element.
    #[inline]
    #[must_use]
    pub fn peek_oldest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Element at `index`, where `0` is the oldest.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        self.buffer[self.slot(index)].as_ref()
    }

    /// Iterates oldest-to-newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let end = self.head + self.len;
        let (front, back) = if end <= self.capacity() {
            (&self.buffer[self.head..end], &self.buffer[..0])
        } else {
            (
                &self.buffer[self.head..],
                &self.buffer[..end - self.capacity()],
            )
        };

        front.iter().chain(back).flatten()
    }

    /// Drops every element.
    ///
    /// O(capacity): slots are reset so evicted values are released.
    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }

    /// Index of the first element for which `pred` is `false`, assuming the
    /// buffer is partitioned by `pred` (all `true` before all `false`).
    pub fn partition_point(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(mid) {
                Some(item) if pred(item) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }
}

impl<T: Clone> RingBuffer<T> {
    /// All elements, oldest-to-newest.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.last(self.len)
    }

    /// The newest `n` elements, oldest-to-newest. Returns everything when
    /// `n` exceeds the current length.
    #[must_use]
    pub fn last(&self, n: usize) -> Vec<T> {
        let n = n.min(self.len);
        (self.len - n..self.len)
            .filter_map(|i| self.get(i).cloned())
            .collect()
    }
}
