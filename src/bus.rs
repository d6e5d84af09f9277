use crate::{IndicatorPoint, InstanceId, SpecId};

use std::fmt::Debug;

/// Points published for one canonical spec after a bar or a backfill.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorUpdate {
    pub spec_id: SpecId,
    /// Instances reading this spec as their root, in id order.
    pub instances: Vec<InstanceId>,
    /// New or replaced points, oldest first.
    pub points: Vec<IndicatorPoint>,
}

/// Handle returned by [`IndicatorBus::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

type Listener = Box<dyn Fn(&IndicatorUpdate) + Send + Sync>;

/// Synchronous fan-out of indicator updates.
///
/// Listeners run on the caller's thread, in subscription order, after the
/// engine has finished mutating its state.
#[derive(Default)]
pub struct IndicatorBus {
    listeners: Vec<(SubscriptionHandle, Listener)>,
    next_handle: u64,
}

impl IndicatorBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        listener: impl Fn(&IndicatorUpdate) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.push((handle, Box::new(listener)));
        handle
    }

    /// Removes a listener. Returns `false` for an unknown handle.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    pub fn publish(&self, update: &IndicatorUpdate) {
        for (_, listener) in &self.listeners {
            listener(update);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Debug for IndicatorBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorBus")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointStatus;

    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    fn update(id: &str) -> IndicatorUpdate {
        IndicatorUpdate {
            spec_id: SpecId::from(id),
            instances: vec![],
            points: vec![IndicatorPoint::new(1, &["value"], vec![None], PointStatus::Final)],
        }
    }

    #[test]
    fn is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IndicatorBus>();
        assert_send_sync::<IndicatorUpdate>();
    }

    #[test]
    fn delivers_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = IndicatorBus::new();

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |u| seen.lock().unwrap().push(format!("{tag}:{}", u.spec_id)));
        }

        bus.publish(&update("x"));
        assert_eq!(*seen.lock().unwrap(), ["a:x", "b:x"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = IndicatorBus::new();

        let counter = Arc::clone(&count);
        let handle = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&update("x"));
        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        bus.publish(&update("x"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(bus.is_empty());
    }
}
