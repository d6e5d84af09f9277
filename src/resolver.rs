use crate::{CanonicalSpec, EngineError, SpecId, kernel::Kernel};

use std::{
    collections::{HashMap, hash_map::Entry},
    hash::Hash,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first topological order of everything reachable from `roots`,
/// dependencies before dependents.
///
/// Returns the first node found on a cycle as the error.
pub(crate) fn topological_order<K, F, I>(roots: &[K], mut edges: F) -> Result<Vec<K>, K>
where
    K: Clone + Eq + Hash,
    F: FnMut(&K) -> I,
    I: IntoIterator<Item = K>,
{
    let mut marks: HashMap<K, Mark> = HashMap::new();
    let mut order = Vec::new();

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }

        marks.insert(root.clone(), Mark::Visiting);
        let mut stack = vec![(root.clone(), edges(root).into_iter().collect::<Vec<_>>().into_iter())];

        while let Some((node, children)) = stack.last_mut() {
            match children.next() {
                Some(child) => match marks.get(&child) {
                    Some(Mark::Visiting) => return Err(child),
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child.clone(), Mark::Visiting);
                        let grandchildren = edges(&child).into_iter().collect::<Vec<_>>();
                        stack.push((child, grandchildren.into_iter()));
                    }
                },
                None => {
                    let node = node.clone();
                    stack.pop();
                    marks.insert(node.clone(), Mark::Done);
                    order.push(node);
                }
            }
        }
    }

    Ok(order)
}

/// Dependency closure of `root` in evaluation order, `root` last.
///
/// # Errors
///
/// [`EngineError::CyclicDependency`] naming a spec on the cycle. Specs built
/// from [`Computation`](crate::Computation) always form a tree, so this only
/// fires for graphs no public constructor can produce.
pub(crate) fn resolve(root: &CanonicalSpec) -> Result<Vec<CanonicalSpec>, EngineError> {
    topological_order(std::slice::from_ref(root), CanonicalSpec::dependencies).map_err(|spec| {
        EngineError::CyclicDependency {
            spec: spec.id().to_string(),
        }
    })
}

/// A registered canonical spec.
#[derive(Debug)]
pub(crate) struct Node {
    pub spec: CanonicalSpec,
    pub kernel: Kernel,
    /// Direct dependencies, in the slot order the kernel reads them.
    pub deps: Vec<SpecId>,
    /// Live instances whose closure contains this spec.
    pub ref_count: usize,
}

/// Deduplicated computation graph.
///
/// `nodes` is a valid evaluation order at all times: every node comes after
/// all of its dependencies.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    nodes: Vec<Node>,
    index: HashMap<SpecId, usize>,
}

impl Registry {
    /// Takes one reference on every spec of `closure`, which must be in
    /// evaluation order. Returns the ids of the nodes it created.
    pub(crate) fn acquire(&mut self, closure: &[CanonicalSpec]) -> Vec<SpecId> {
        let mut created = Vec::new();

        for spec in closure {
            match self.index.entry(spec.id().clone()) {
                Entry::Occupied(slot) => self.nodes[*slot.get()].ref_count += 1,
                Entry::Vacant(slot) => {
                    slot.insert(self.nodes.len());
                    self.nodes.push(Node {
                        spec: spec.clone(),
                        kernel: Kernel::new(spec.computation()),
                        deps: spec.dependencies().iter().map(|d| d.id().clone()).collect(),
                        ref_count: 1,
                    });
                    created.push(spec.id().clone());
                }
            }
        }

        created
    }

    /// Drops one reference on every spec of `closure`, dependents first.
    /// Returns the ids of the nodes it evicted.
    pub(crate) fn release(&mut self, closure: &[SpecId]) -> Vec<SpecId> {
        let mut evicted = Vec::new();

        for id in closure.iter().rev() {
            if let Some(node) = self.get_mut(id) {
                node.ref_count = node.ref_count.saturating_sub(1);
                if node.ref_count == 0 {
                    evicted.push(id.clone());
                }
            }
        }

        if !evicted.is_empty() {
            self.nodes.retain(|n| n.ref_count > 0);
            self.index = self
                .nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.spec.id().clone(), i))
                .collect();
        }

        evicted
    }

    pub(crate) fn get(&self, id: &SpecId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub(crate) fn get_mut(&mut self, id: &SpecId) -> Option<&mut Node> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    pub(crate) fn contains(&self, id: &SpecId) -> bool {
        self.index.contains_key(id)
    }

    pub(crate) fn ref_count(&self, id: &SpecId) -> usize {
        self.get(id).map_or(0, |n| n.ref_count)
    }

    /// Ids in evaluation order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = &SpecId> {
        self.nodes.iter().map(|n| n.spec.id())
    }

    /// Nodes in evaluation order.
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmaConfig, MacdConfig, SmaConfig, Timeframe, test_util::nz};

    const TF: Timeframe = Timeframe::minutes(1);

    fn ids(specs: &[CanonicalSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.id().as_str()).collect()
    }

    mod topological {
        use super::*;

        fn graph(edges: &[(u8, u8)]) -> impl Fn(&u8) -> Vec<u8> + '_ {
            move |node| {
                edges
                    .iter()
                    .filter(|(from, _)| from == node)
                    .map(|(_, to)| *to)
                    .collect()
            }
        }

        #[test]
        fn dependencies_come_first() {
            // 1 -> 2 -> 4, 1 -> 3 -> 4
            let edges = [(1, 2), (1, 3), (2, 4), (3, 4)];
            let order = topological_order(&[1], graph(&edges)).unwrap();

            let pos = |n| order.iter().position(|x| *x == n).unwrap();
            assert_eq!(order.len(), 4);
            assert!(pos(4) < pos(2) && pos(4) < pos(3));
            assert!(pos(2) < pos(1) && pos(3) < pos(1));
        }

        #[test]
        fn shared_node_visited_once() {
            let edges = [(1, 3), (2, 3)];
            let order = topological_order(&[1, 2], graph(&edges)).unwrap();
            assert_eq!(order, [3, 1, 2]);
        }

        #[test]
        fn detects_cycle() {
            let edges = [(1, 2), (2, 3), (3, 1)];
            let err = topological_order(&[1], graph(&edges)).unwrap_err();
            assert!([1, 2, 3].contains(&err));
        }

        #[test]
        fn detects_self_loop() {
            let edges = [(5, 5)];
            assert_eq!(topological_order(&[5], graph(&edges)), Err(5));
        }
    }

    mod closure {
        use super::*;

        #[test]
        fn primitive_resolves_to_itself() {
            let spec = CanonicalSpec::new(SmaConfig::close(nz(5)), TF);
            assert_eq!(ids(&resolve(&spec).unwrap()), [spec.id().as_str()]);
        }

        #[test]
        fn macd_closure_is_deduplicated_and_ordered() {
            let spec = CanonicalSpec::new(MacdConfig::default(), TF);
            let closure = resolve(&spec).unwrap();

            assert_eq!(
                ids(&closure),
                [
                    "ema(length=12,source=close)@1m",
                    "ema(length=26,source=close)@1m",
                    "macd_line(fast=12,slow=26,source=close)@1m",
                    "ema(length=9,source=macd_line(fast=12,slow=26,source=close).value)@1m",
                    "macd(fast=12,signal=9,slow=26,source=close)@1m",
                ]
            );
        }
    }

    mod registry {
        use super::*;

        fn macd_closure() -> Vec<CanonicalSpec> {
            resolve(&CanonicalSpec::new(MacdConfig::default(), TF)).unwrap()
        }

        fn closure_ids(closure: &[CanonicalSpec]) -> Vec<SpecId> {
            closure.iter().map(|s| s.id().clone()).collect()
        }

        #[test]
        fn acquire_creates_once_and_counts() {
            let mut registry = Registry::default();
            let ema = resolve(&CanonicalSpec::new(EmaConfig::close(nz(12)), TF)).unwrap();

            assert_eq!(registry.acquire(&ema).len(), 1);
            let created = registry.acquire(&macd_closure());

            assert_eq!(created.len(), 4);
            assert_eq!(registry.len(), 5);
            assert_eq!(registry.ref_count(ema[0].id()), 2);
        }

        #[test]
        fn order_stays_topological() {
            let mut registry = Registry::default();
            registry.acquire(&resolve(&CanonicalSpec::new(EmaConfig::close(nz(26)), TF)).unwrap());
            registry.acquire(&macd_closure());

            let order: Vec<_> = registry.ids().collect();
            for (own, id) in order.iter().enumerate() {
                for dep in &registry.get(id).unwrap().deps {
                    assert!(order.iter().position(|x| *x == dep).unwrap() < own);
                }
            }
        }

        #[test]
        fn release_evicts_at_zero() {
            let mut registry = Registry::default();
            let ema = resolve(&CanonicalSpec::new(EmaConfig::close(nz(12)), TF)).unwrap();
            let macd = macd_closure();

            registry.acquire(&ema);
            registry.acquire(&macd);
            let evicted = registry.release(&closure_ids(&macd));

            assert_eq!(evicted.len(), 4);
            assert_eq!(registry.len(), 1);
            assert_eq!(registry.ref_count(ema[0].id()), 1);
            assert_eq!(registry.ids().collect::<Vec<_>>(), [ema[0].id()]);
            assert!(!registry.contains(macd.last().unwrap().id()));
        }

        #[test]
        fn release_unknown_is_noop() {
            let mut registry = Registry::default();
            assert!(registry.release(&[SpecId::from("sma(length=1,source=close)@1m")]).is_empty());
        }
    }
}
