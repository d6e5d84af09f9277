use crate::{
    Bar, CanonicalSpec, Computation, EngineError, IndicatorBus, IndicatorKind, IndicatorPoint,
    IndicatorUpdate, OutputMeta, Pane, Params, RingBuffer, SeriesState, SpecId, StepInput,
    SubscriptionHandle, Timeframe, Timestamp, resolver, resolver::Registry,
};

use std::{collections::BTreeMap, fmt::Display, num::NonZero};
use tracing::{debug, trace, warn};

/// Settings of one [`EngineContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    capacity: NonZero<usize>,
    timeframe: Timeframe,
}

impl EngineConfig {
    pub const DEFAULT_CAPACITY: usize = 1000;

    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Bars and points kept per buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    #[must_use]
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: NonZero::new(Self::DEFAULT_CAPACITY).expect("default capacity is positive"),
            timeframe: Timeframe::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
///
/// Defaults: capacity 1000, timeframe 1 minute.
pub struct EngineConfigBuilder {
    capacity: usize,
    timeframe: Timeframe,
}

impl EngineConfigBuilder {
    fn new() -> Self {
        Self {
            capacity: EngineConfig::DEFAULT_CAPACITY,
            timeframe: Timeframe::default(),
        }
    }

    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidCapacity`] when the capacity is zero.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        Ok(EngineConfig {
            capacity: NonZero::new(self.capacity).ok_or(EngineError::InvalidCapacity)?,
            timeframe: self.timeframe,
        })
    }
}

/// User-facing identity of a registered indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceId(u64);

impl InstanceId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An indicator as the consumer sees it.
///
/// Its values are the points of its root canonical spec; `closure` lists
/// every spec the root needs, root last.
#[derive(Clone, Debug)]
pub struct IndicatorInstance {
    id: InstanceId,
    spec: CanonicalSpec,
    closure: Vec<SpecId>,
    outputs: Vec<OutputMeta>,
    pane: Pane,
}

impl IndicatorInstance {
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    #[must_use]
    pub fn spec(&self) -> &CanonicalSpec {
        &self.spec
    }

    #[must_use]
    pub fn spec_id(&self) -> &SpecId {
        self.spec.id()
    }

    #[must_use]
    pub fn kind(&self) -> IndicatorKind {
        self.spec.computation().kind()
    }

    #[must_use]
    pub fn closure(&self) -> &[SpecId] {
        &self.closure
    }

    #[must_use]
    pub fn outputs(&self) -> &[OutputMeta] {
        &self.outputs
    }

    #[must_use]
    pub fn pane(&self) -> Pane {
        self.pane
    }

    /// Leading bars without a complete point: the maximum over the outputs.
    #[must_use]
    pub fn warmup(&self) -> usize {
        self.outputs.iter().map(|o| o.warmup).max().unwrap_or(0)
    }
}

/// Points produced by one mutation, grouped by spec in evaluation order.
#[derive(Default)]
struct Pending(Vec<(SpecId, Vec<IndicatorPoint>)>);

impl Pending {
    fn push(&mut self, id: &SpecId, point: IndicatorPoint) {
        match self.0.iter_mut().find(|(s, _)| s == id) {
            Some((_, points)) => points.push(point),
            None => self.0.push((id.clone(), vec![point])),
        }
    }

    fn extend(&mut self, id: &SpecId, points: Vec<IndicatorPoint>) {
        self.0.push((id.clone(), points));
    }
}

/// One chart session: bar history, the deduplicated computation graph, the
/// user-facing instances and the update bus.
///
/// Every mutating call applies its whole effect before any subscriber is
/// notified. The context is `Send + Sync`; share it behind a
/// `RwLock` for one writer and many readers.
#[derive(Debug)]
pub struct EngineContext {
    config: EngineConfig,
    series: SeriesState,
    registry: Registry,
    instances: BTreeMap<InstanceId, IndicatorInstance>,
    next_instance: u64,
    bus: IndicatorBus,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EngineContext {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            series: SeriesState::new(config.capacity),
            registry: Registry::default(),
            instances: BTreeMap::new(),
            next_instance: 0,
            bus: IndicatorBus::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn series(&self) -> &SeriesState {
        &self.series
    }

    // --- registration -----------------------------------------------------

    /// Registers an indicator from loosely-typed parameters.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidIndicatorParams`] when `params` do not normalize,
    /// plus everything [`register`](Self::register) reports.
    pub fn register_indicator(
        &mut self,
        kind: IndicatorKind,
        params: &Params,
        timeframe: Timeframe,
    ) -> Result<InstanceId, EngineError> {
        let computation = Computation::from_params(kind, params)?;
        self.register(computation, timeframe)
    }

    /// Registers an indicator from a typed config.
    ///
    /// Specs already live are shared and only gain a reference; new ones are
    /// backfilled over the resident bars before this returns.
    ///
    /// # Errors
    ///
    /// [`EngineError::TimeframeMismatch`] when `timeframe` is not the
    /// context's, [`EngineError::CyclicDependency`] when the closure loops.
    /// Nothing is registered on error.
    pub fn register(
        &mut self,
        computation: impl Into<Computation>,
        timeframe: Timeframe,
    ) -> Result<InstanceId, EngineError> {
        if timeframe != self.config.timeframe {
            return Err(EngineError::TimeframeMismatch {
                expected: self.config.timeframe,
                got: timeframe,
            });
        }

        let spec = CanonicalSpec::new(computation, timeframe);
        let closure = resolver::resolve(&spec)?;
        let created = self.registry.acquire(&closure);

        let mut pending = Pending::default();
        for id in &created {
            let points = self.backfill(id);
            debug!(spec = %id, points = points.len(), "computation registered");
            pending.extend(id, points);
        }
        for shared in closure.iter().filter(|s| !created.contains(s.id())) {
            debug!(
                spec = %shared.id(),
                ref_count = self.registry.ref_count(shared.id()),
                "computation shared"
            );
        }

        let id = InstanceId(self.next_instance);
        self.next_instance += 1;

        let computation = spec.computation();
        let instance = IndicatorInstance {
            id,
            closure: closure.iter().map(|s| s.id().clone()).collect(),
            outputs: computation.outputs(),
            pane: computation.pane(),
            spec,
        };
        debug!(instance = %id, spec = %instance.spec_id(), warmup = instance.warmup(), "indicator registered");
        self.instances.insert(id, instance);

        self.publish(pending);
        Ok(id)
    }

    /// Removes an instance, evicting every spec nothing else references.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`] for an id that is not registered.
    pub fn unregister_indicator(&mut self, id: InstanceId) -> Result<(), EngineError> {
        let instance = self
            .instances
            .remove(&id)
            .ok_or(EngineError::UnknownInstance(id))?;

        for spec in self.registry.release(&instance.closure) {
            self.series.remove_points(&spec);
            debug!(spec = %spec, "computation evicted");
        }
        debug!(instance = %id, "indicator unregistered");
        Ok(())
    }

    /// Recomputes `id` over every resident bar from fresh state.
    fn backfill(&mut self, id: &SpecId) -> Vec<IndicatorPoint> {
        let Some(node) = self.registry.get_mut(id) else {
            return Vec::new();
        };
        node.kernel.reset();

        let mut buffer = self.series.empty_points();
        for bar in self.series.bars().iter() {
            let deps: Vec<_> = node
                .deps
                .iter()
                .map(|dep| self.series.point_at(dep, bar.t()))
                .collect();
            buffer.push(node.kernel.incremental(&StepInput::with_deps(bar, &deps)));
        }

        let points = buffer.to_vec();
        self.series.set_points(id, buffer);
        points
    }

    // --- ingestion --------------------------------------------------------

    /// Applies one bar and runs a computation pass.
    ///
    /// A bar with the timestamp of a partial newest bar replaces it. A newer
    /// bar arriving while the newest is partial first finalizes it with its
    /// last delivered values.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidBar`] for a malformed bar and
    /// [`EngineError::OutOfOrderBar`] for one that does not follow the
    /// history. Rejected bars leave every buffer untouched.
    pub fn add_bar(&mut self, bar: Bar) -> Result<(), EngineError> {
        if let Err(e) = bar.validate() {
            warn!(t = bar.t(), error = %e, "bar rejected");
            return Err(e);
        }

        let mut pending = Pending::default();
        match self.series.last_bar().copied() {
            Some(last) if bar.t() < last.t() || (bar.t() == last.t() && last.is_final()) => {
                warn!(t = bar.t(), last = last.t(), "out of order bar rejected");
                return Err(EngineError::OutOfOrderBar {
                    t: bar.t(),
                    last: last.t(),
                });
            }
            Some(last) if bar.t() == last.t() => {
                self.series.replace_last_bar(bar);
                self.compute_pass(&mut pending);
            }
            Some(last) if last.is_partial() => {
                trace!(t = last.t(), "implicit finalization");
                self.series.replace_last_bar(last.finalized());
                self.compute_pass(&mut pending);
                self.series.push_bar(bar);
                self.compute_pass(&mut pending);
            }
            _ => {
                self.series.push_bar(bar);
                self.compute_pass(&mut pending);
            }
        }

        self.publish(pending);
        Ok(())
    }

    /// Evaluates every node on the newest bar, dependencies first.
    fn compute_pass(&mut self, pending: &mut Pending) {
        let Some(bar) = self.series.last_bar().copied() else {
            return;
        };
        trace!(t = bar.t(), partial = bar.is_partial(), specs = self.registry.len(), "computation pass");

        for node in self.registry.nodes_mut() {
            let point = {
                let deps: Vec<_> = node
                    .deps
                    .iter()
                    .map(|dep| self.series.points(dep).and_then(RingBuffer::peek))
                    .collect();
                node.kernel.incremental(&StepInput::with_deps(&bar, &deps))
            };
            let id = node.spec.id();
            self.series.upsert_point(id, point.clone());
            pending.push(id, point);
        }
    }

    /// Replaces the bar history and recomputes every live spec.
    ///
    /// `bars` must have strictly increasing timestamps and only the last one
    /// may be partial. Only the newest `capacity` bars are kept.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidBar`] or [`EngineError::OutOfOrderBar`]; the
    /// context is unchanged on error.
    pub fn resync(&mut self, bars: impl IntoIterator<Item = Bar>) -> Result<(), EngineError> {
        let bars: Vec<Bar> = bars.into_iter().collect();

        for (i, bar) in bars.iter().enumerate() {
            bar.validate()?;
            if bar.is_partial() && i + 1 != bars.len() {
                return Err(EngineError::InvalidBar {
                    t: bar.t(),
                    reason: "only the newest bar may be partial",
                });
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &bars[p])
                && prev.t() >= bar.t()
            {
                return Err(EngineError::OutOfOrderBar {
                    t: bar.t(),
                    last: prev.t(),
                });
            }
        }

        self.series.clear();
        for bar in bars {
            self.series.push_bar(bar);
        }

        let ids: Vec<SpecId> = self.registry.ids().cloned().collect();
        let mut pending = Pending::default();
        for id in &ids {
            let points = self.backfill(id);
            pending.extend(id, points);
        }
        debug!(bars = self.series.bars().len(), specs = ids.len(), "resync complete");

        self.publish(pending);
        Ok(())
    }

    fn publish(&self, pending: Pending) {
        if self.bus.is_empty() {
            return;
        }
        for (spec_id, points) in pending.0 {
            let instances = self
                .instances
                .values()
                .filter(|i| *i.spec_id() == spec_id)
                .map(IndicatorInstance::id)
                .collect();
            self.bus.publish(&IndicatorUpdate {
                spec_id,
                instances,
                points,
            });
        }
    }

    // --- subscription -----------------------------------------------------

    /// Adds a listener for every future update. Past points are not replayed;
    /// read them through the query methods.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&IndicatorUpdate) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.bus.subscribe(listener)
    }

    /// Returns `false` for an unknown handle.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    // --- queries ----------------------------------------------------------

    /// Up to `n` newest bars, oldest first.
    #[must_use]
    pub fn latest_bars(&self, n: usize) -> Vec<Bar> {
        self.series.latest_bars(n)
    }

    /// Resident bars with `start <= t <= end`.
    #[must_use]
    pub fn bars_in_range(&self, start: Timestamp, end: Timestamp) -> Vec<Bar> {
        self.series.bars_in_range(start, end)
    }

    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`].
    pub fn instance(&self, id: InstanceId) -> Result<&IndicatorInstance, EngineError> {
        self.instances.get(&id).ok_or(EngineError::UnknownInstance(id))
    }

    /// Live instances in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &IndicatorInstance> {
        self.instances.values()
    }

    /// Point buffer of an instance. Instances sharing a spec share the buffer.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`].
    pub fn indicator_points(&self, id: InstanceId) -> Result<&RingBuffer<IndicatorPoint>, EngineError> {
        let spec = self.instance(id)?.spec_id();
        self.series
            .points(spec)
            .ok_or_else(|| EngineError::UnknownCanonicalSpec(spec.clone()))
    }

    /// Up to `n` newest points of an instance, oldest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`].
    pub fn latest_indicator_points(
        &self,
        id: InstanceId,
        n: usize,
    ) -> Result<Vec<IndicatorPoint>, EngineError> {
        self.spec_points(self.instance(id)?.spec_id(), n)
    }

    /// Points of an instance with `start <= t <= end`.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`].
    pub fn indicator_points_in_range(
        &self,
        id: InstanceId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<IndicatorPoint>, EngineError> {
        let spec = self.instance(id)?.spec_id();
        self.series
            .points_in_range(spec, start, end)
            .ok_or_else(|| EngineError::UnknownCanonicalSpec(spec.clone()))
    }

    /// Up to `n` newest points of a canonical spec, oldest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownCanonicalSpec`] when the spec is not live.
    pub fn spec_points(&self, id: &SpecId, n: usize) -> Result<Vec<IndicatorPoint>, EngineError> {
        self.series
            .latest_points(id, n)
            .ok_or_else(|| EngineError::UnknownCanonicalSpec(id.clone()))
    }

    /// Instances whose closure contains `id`; zero once evicted.
    #[must_use]
    pub fn ref_count(&self, id: &SpecId) -> usize {
        self.registry.ref_count(id)
    }

    /// Whether `id` is live.
    #[must_use]
    pub fn contains_spec(&self, id: &SpecId) -> bool {
        self.registry.contains(id)
    }

    /// Live canonical specs in evaluation order.
    pub fn specs(&self) -> impl Iterator<Item = &SpecId> {
        self.registry.ids()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{
        EmaConfig, MacdConfig, ParamValue, PointStatus, PriceSource, SmaConfig,
        test_util::{bar, nz},
    };

    use std::sync::{Arc, Mutex};

    const TF: Timeframe = Timeframe::minutes(1);

    fn context(capacity: usize) -> EngineContext {
        EngineContext::new(EngineConfig::builder().capacity(capacity).build().unwrap())
    }

    fn feed(ctx: &mut EngineContext, closes: &[f64]) {
        for (t, close) in (1..).zip(closes) {
            ctx.add_bar(bar(*close, t)).unwrap();
        }
    }

    fn values(ctx: &EngineContext, id: InstanceId) -> Vec<Option<f64>> {
        ctx.indicator_points(id)
            .unwrap()
            .iter()
            .map(IndicatorPoint::value)
            .collect()
    }

    #[test]
    fn is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineContext>();
    }

    mod config {
        use super::*;

        #[test]
        fn defaults() {
            let config = EngineConfig::default();
            assert_eq!(config.capacity(), 1000);
            assert_eq!(config.timeframe(), Timeframe::minutes(1));
            assert_eq!(EngineConfig::builder().build().unwrap(), config);
        }

        #[test]
        fn zero_capacity_rejected() {
            assert_eq!(
                EngineConfig::builder().capacity(0).build(),
                Err(EngineError::InvalidCapacity)
            );
        }

        #[test]
        fn instance_id_display() {
            assert_eq!(InstanceId(3).to_string(), "#3");
        }
    }

    mod registration {
        use super::*;

        #[test]
        fn backfills_over_resident_bars() {
            let mut ctx = context(10);
            feed(&mut ctx, &[1.0, 2.0, 3.0, 4.0, 5.0]);

            let id = ctx.register(SmaConfig::close(nz(3)), TF).unwrap();
            assert_eq!(values(&ctx, id), [None, None, Some(2.0), Some(3.0), Some(4.0)]);
        }

        #[test]
        fn params_path_matches_typed_path() {
            let mut ctx = context(10);
            let params = Params::new()
                .with("length", ParamValue::Int(3))
                .with("source", PriceSource::Close);

            let a = ctx.register_indicator(IndicatorKind::Sma, &params, TF).unwrap();
            let b = ctx.register(SmaConfig::close(nz(3)), TF).unwrap();

            assert_ne!(a, b);
            assert_eq!(ctx.instance(a).unwrap().spec_id(), ctx.instance(b).unwrap().spec_id());
            assert_eq!(ctx.ref_count(ctx.instance(a).unwrap().spec_id()), 2);
        }

        #[test]
        fn invalid_params_register_nothing() {
            let mut ctx = context(10);
            let err = ctx
                .register_indicator(IndicatorKind::Ema, &Params::new(), TF)
                .unwrap_err();

            assert!(matches!(err, EngineError::InvalidIndicatorParams { .. }));
            assert_eq!(ctx.instances().count(), 0);
            assert_eq!(ctx.specs().count(), 0);
        }

        #[test]
        fn timeframe_mismatch() {
            let mut ctx = context(10);
            let err = ctx
                .register(SmaConfig::close(nz(3)), Timeframe::hours(1))
                .unwrap_err();

            assert_eq!(
                err,
                EngineError::TimeframeMismatch {
                    expected: TF,
                    got: Timeframe::hours(1)
                }
            );
        }

        #[test]
        fn instance_metadata() {
            let mut ctx = context(10);
            let id = ctx.register(MacdConfig::default(), TF).unwrap();
            let instance = ctx.instance(id).unwrap();

            assert_eq!(instance.kind(), IndicatorKind::Macd);
            assert_eq!(instance.pane(), Pane::Separate);
            assert_eq!(instance.warmup(), 33);
            assert_eq!(instance.closure().len(), 5);
            assert_eq!(instance.closure().last(), Some(instance.spec_id()));
        }

        #[test]
        fn unregister_unknown() {
            let mut ctx = context(10);
            assert_eq!(
                ctx.unregister_indicator(InstanceId(7)),
                Err(EngineError::UnknownInstance(InstanceId(7)))
            );
        }
    }

    mod sharing {
        use super::*;

        #[test]
        fn macd_reuses_existing_ema() {
            let mut ctx = context(10);
            let ema = ctx.register(EmaConfig::close(nz(12)), TF).unwrap();
            let macd = ctx.register(MacdConfig::default(), TF).unwrap();

            let ema_id = ctx.instance(ema).unwrap().spec_id().clone();
            assert_eq!(ctx.ref_count(&ema_id), 2);

            ctx.unregister_indicator(macd).unwrap();
            assert_eq!(ctx.ref_count(&ema_id), 1);
            assert_eq!(ctx.specs().count(), 1);
        }

        #[test]
        fn eviction_drops_buffers() {
            let mut ctx = context(10);
            feed(&mut ctx, &[1.0, 2.0]);
            let id = ctx.register(SmaConfig::close(nz(2)), TF).unwrap();
            let spec = ctx.instance(id).unwrap().spec_id().clone();

            ctx.unregister_indicator(id).unwrap();

            assert!(!ctx.contains_spec(&spec));
            assert!(ctx.series().points(&spec).is_none());
            assert_eq!(
                ctx.spec_points(&spec, 1),
                Err(EngineError::UnknownCanonicalSpec(spec))
            );
        }
    }

    mod ingestion {
        use super::*;

        #[test]
        fn rejects_out_of_order() {
            let mut ctx = context(10);
            ctx.add_bar(bar(1.0, 100)).unwrap();

            for t in [100, 90] {
                assert_eq!(
                    ctx.add_bar(bar(2.0, t)),
                    Err(EngineError::OutOfOrderBar { t, last: 100 })
                );
            }
            assert_eq!(ctx.latest_bars(10), [bar(1.0, 100)]);
        }

        #[test]
        fn rejects_partial_behind_final() {
            let mut ctx = context(10);
            ctx.add_bar(bar(1.0, 100)).unwrap();
            assert!(ctx.add_bar(bar(1.0, 100).partial()).is_err());
        }

        #[test]
        fn rejects_invalid_bar() {
            let mut ctx = context(10);
            let broken = Bar::new(1, 10.0, 9.0, 8.0, 10.0, 0.0);
            assert!(matches!(
                ctx.add_bar(broken),
                Err(EngineError::InvalidBar { t: 1, .. })
            ));
            assert!(ctx.latest_bars(1).is_empty());
        }

        #[test]
        fn partial_replaced_then_finalized() {
            let mut ctx = context(10);
            let id = ctx.register(SmaConfig::close(nz(2)), TF).unwrap();
            ctx.add_bar(bar(10.0, 1)).unwrap();

            for close in [20.0, 40.0, 30.0] {
                ctx.add_bar(bar(close, 2).partial()).unwrap();
            }
            let last = ctx.latest_indicator_points(id, 1).unwrap();
            assert_eq!(last[0].status(), PointStatus::Partial);
            assert_eq!(last[0].value(), Some(20.0));

            ctx.add_bar(bar(30.0, 2)).unwrap();
            ctx.add_bar(bar(50.0, 3)).unwrap();

            assert_eq!(values(&ctx, id), [None, Some(20.0), Some(40.0)]);
            assert!(ctx.indicator_points(id).unwrap().iter().all(IndicatorPoint::is_final));
        }

        #[test]
        fn newer_bar_finalizes_partial() {
            let mut ctx = context(10);
            let id = ctx.register(SmaConfig::close(nz(2)), TF).unwrap();
            ctx.add_bar(bar(10.0, 1)).unwrap();
            ctx.add_bar(bar(20.0, 2).partial()).unwrap();
            ctx.add_bar(bar(40.0, 3)).unwrap();

            assert!(ctx.latest_bars(3).iter().all(Bar::is_final));
            assert_eq!(values(&ctx, id), [None, Some(15.0), Some(30.0)]);
            assert!(ctx.indicator_points(id).unwrap().iter().all(IndicatorPoint::is_final));
        }

        #[test]
        fn buffers_stay_bounded() {
            let mut ctx = context(3);
            let id = ctx.register(SmaConfig::close(nz(2)), TF).unwrap();
            feed(&mut ctx, &[1.0, 2.0, 3.0, 4.0, 5.0]);

            assert_eq!(ctx.latest_bars(10).len(), 3);
            assert_eq!(values(&ctx, id), [Some(2.5), Some(3.5), Some(4.5)]);
        }

        #[test]
        fn queries_by_range() {
            let mut ctx = context(10);
            let id = ctx.register(SmaConfig::close(nz(1)), TF).unwrap();
            feed(&mut ctx, &[1.0, 2.0, 3.0, 4.0]);

            let points = ctx.indicator_points_in_range(id, 2, 3).unwrap();
            assert_eq!(points.iter().map(IndicatorPoint::t).collect::<Vec<_>>(), [2, 3]);
            assert_eq!(ctx.bars_in_range(4, 9), [bar(4.0, 4)]);
        }
    }

    mod resync {
        use super::*;

        #[test]
        fn recomputes_live_specs() {
            let mut ctx = context(10);
            let id = ctx.register(SmaConfig::close(nz(2)), TF).unwrap();
            feed(&mut ctx, &[100.0, 200.0, 300.0]);

            ctx.resync([bar(1.0, 1), bar(3.0, 2), bar(5.0, 3).partial()]).unwrap();

            assert_eq!(values(&ctx, id), [None, Some(2.0), Some(4.0)]);
            let last = ctx.latest_indicator_points(id, 1).unwrap();
            assert_eq!(last[0].status(), PointStatus::Partial);
        }

        #[test]
        fn validation_is_fail_closed() {
            let mut ctx = context(10);
            feed(&mut ctx, &[1.0, 2.0]);
            let before = ctx.latest_bars(10);

            assert!(matches!(
                ctx.resync([bar(1.0, 2), bar(1.0, 1)]),
                Err(EngineError::OutOfOrderBar { t: 1, last: 2 })
            ));
            assert!(matches!(
                ctx.resync([bar(1.0, 1).partial(), bar(1.0, 2)]),
                Err(EngineError::InvalidBar { t: 1, .. })
            ));
            assert_eq!(ctx.latest_bars(10), before);
        }
    }

    mod bus {
        use super::*;

        #[test]
        fn publishes_after_each_bar() {
            let mut ctx = context(10);
            let id = ctx.register(SmaConfig::close(nz(1)), TF).unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));

            let sink = Arc::clone(&seen);
            ctx.subscribe(move |u| sink.lock().unwrap().push(u.clone()));
            feed(&mut ctx, &[7.0]);

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].instances, [id]);
            assert_eq!(seen[0].points[0].value(), Some(7.0));
        }

        #[test]
        fn implicit_finalization_publishes_both_bars() {
            let mut ctx = context(10);
            ctx.register(SmaConfig::close(nz(1)), TF).unwrap();
            ctx.add_bar(bar(1.0, 1).partial()).unwrap();

            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            ctx.subscribe(move |u| sink.lock().unwrap().extend(u.points.clone()));
            ctx.add_bar(bar(2.0, 2)).unwrap();

            let seen = seen.lock().unwrap();
            let ts: Vec<_> = seen.iter().map(|p| (p.t(), p.status())).collect();
            assert_eq!(ts, [(1, PointStatus::Final), (2, PointStatus::Final)]);
        }

        #[test]
        fn registration_publishes_backfill() {
            let mut ctx = context(10);
            feed(&mut ctx, &[1.0, 2.0, 3.0]);
            let seen = Arc::new(Mutex::new(Vec::new()));

            let sink = Arc::clone(&seen);
            let handle = ctx.subscribe(move |u| sink.lock().unwrap().push(u.points.len()));
            ctx.register(SmaConfig::close(nz(2)), TF).unwrap();
            assert!(ctx.unsubscribe(handle));
            ctx.add_bar(bar(4.0, 4)).unwrap();

            assert_eq!(ctx.latest_bars(1)[0].t(), 4);

            assert_eq!(*seen.lock().unwrap(), [3]);
        }
    }
}
