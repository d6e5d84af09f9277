use crate::{Bar, IndicatorPoint, RingBuffer, SpecId, Timestamp};

use std::{collections::HashMap, num::NonZero};

/// Bounded storage of bars and of the points of every registered spec.
///
/// All buffers share one capacity. Point buffers are aligned with the bar
/// buffer: the newest point of every spec belongs to the newest bar.
///
/// Read-only from the outside; the owning [`EngineContext`](crate::EngineContext)
/// is the single writer.
#[derive(Debug)]
pub struct SeriesState {
    capacity: NonZero<usize>,
    bars: RingBuffer<Bar>,
    points: HashMap<SpecId, RingBuffer<IndicatorPoint>>,
}

impl SeriesState {
    pub(crate) fn new(capacity: NonZero<usize>) -> Self {
        Self {
            capacity,
            bars: RingBuffer::with_capacity(capacity),
            points: HashMap::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    #[must_use]
    pub fn bars(&self) -> &RingBuffer<Bar> {
        &self.bars
    }

    #[must_use]
    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.peek()
    }

    /// Up to `n` newest bars, oldest first.
    #[must_use]
    pub fn latest_bars(&self, n: usize) -> Vec<Bar> {
        self.bars.last(n)
    }

    #[must_use]
    pub fn all_bars(&self) -> Vec<Bar> {
        self.bars.to_vec()
    }

    pub(crate) fn push_bar(&mut self, bar: Bar) {
        self.bars.push(bar);
    }

    /// Swaps the newest bar for `bar`, which shares its timestamp.
    pub(crate) fn replace_last_bar(&mut self, bar: Bar) {
        debug_assert_eq!(self.bars.peek().map(Bar::t), Some(bar.t()));
        if let Err(bar) = self.bars.replace_last(bar) {
            self.bars.push(bar);
        }
    }

    /// Resident bars with `start <= t <= end`.
    #[must_use]
    pub fn bars_in_range(&self, start: Timestamp, end: Timestamp) -> Vec<Bar> {
        let from = self.bars.partition_point(|b| b.t() < start);
        let to = self.bars.partition_point(|b| b.t() <= end);
        (from..to).filter_map(|i| self.bars.get(i).copied()).collect()
    }

    #[must_use]
    pub fn points(&self, id: &SpecId) -> Option<&RingBuffer<IndicatorPoint>> {
        self.points.get(id)
    }

    /// Up to `n` newest points of `id`, oldest first. `None` when no buffer
    /// exists for `id`.
    #[must_use]
    pub fn latest_points(&self, id: &SpecId, n: usize) -> Option<Vec<IndicatorPoint>> {
        self.points.get(id).map(|p| p.last(n))
    }

    /// Points of `id` with `start <= t <= end`.
    #[must_use]
    pub fn points_in_range(
        &self,
        id: &SpecId,
        start: Timestamp,
        end: Timestamp,
    ) -> Option<Vec<IndicatorPoint>> {
        let points = self.points.get(id)?;
        let from = points.partition_point(|p| p.t() < start);
        let to = points.partition_point(|p| p.t() <= end);
        Some((from..to).filter_map(|i| points.get(i).cloned()).collect())
    }

    /// Point of `id` for bar `t`. `None` once `t` has been evicted.
    #[must_use]
    pub fn point_at(&self, id: &SpecId, t: Timestamp) -> Option<&IndicatorPoint> {
        let points = self.points.get(id)?;
        let index = points.partition_point(|p| p.t() < t);
        points.get(index).filter(|p| p.t() == t)
    }

    /// Adds the point of the newest bar, replacing a point for the same bar.
    pub(crate) fn upsert_point(&mut self, id: &SpecId, point: IndicatorPoint) {
        let capacity = self.capacity;
        let points = self
            .points
            .entry(id.clone())
            .or_insert_with(|| RingBuffer::with_capacity(capacity));

        match points.peek_mut() {
            Some(last) if last.t() == point.t() => *last = point,
            _ => {
                points.push(point);
            }
        }
    }

    /// Installs a freshly computed buffer for `id`.
    pub(crate) fn set_points(&mut self, id: &SpecId, points: RingBuffer<IndicatorPoint>) {
        self.points.insert(id.clone(), points);
    }

    pub(crate) fn remove_points(&mut self, id: &SpecId) {
        self.points.remove(id);
    }

    pub(crate) fn empty_points(&self) -> RingBuffer<IndicatorPoint> {
        RingBuffer::with_capacity(self.capacity)
    }

    /// Drops every bar and point, keeping the set of point buffers.
    pub(crate) fn clear(&mut self) {
        self.bars.clear();
        self.points.values_mut().for_each(RingBuffer::clear);
    }
}
