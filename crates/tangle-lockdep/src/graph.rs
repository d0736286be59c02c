//! Acquired-before graph.
//!
//! An edge `a -> b` means some thread blocked on `b` while holding `a`. A path
//! back from `b` to `a` means two threads can each hold what the other wants.

use std::collections::{BTreeMap, VecDeque};

/// Where an edge was first observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EdgeOrigin {
    pub(crate) thread: String,
    pub(crate) backtrace: Option<String>,
}

/// Uses `BTreeMap` so iteration (and therefore reported paths) is
/// deterministic.
#[derive(Debug)]
pub(crate) struct OrderGraph<K> {
    edges: BTreeMap<K, BTreeMap<K, EdgeOrigin>>,
}

impl<K: Ord + Copy> OrderGraph<K> {
    pub(crate) fn new() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }

    pub(crate) fn contains_edge(&self, from: K, to: K) -> bool {
        self.edges
            .get(&from)
            .is_some_and(|targets| targets.contains_key(&to))
    }

    /// Returns `true` if the edge was not recorded before.
    pub(crate) fn add_edge(&mut self, from: K, to: K, origin: EdgeOrigin) -> bool {
        let targets = self.edges.entry(from).or_default();
        if targets.contains_key(&to) {
            return false;
        }
        targets.insert(to, origin);
        true
    }

    /// Shortest path from `from` to `to`, both ends included.
    pub(crate) fn path(&self, from: K, to: K) -> Option<Vec<K>> {
        if from == to {
            return Some(vec![from]);
        }

        let mut parent: BTreeMap<K, K> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            let Some(targets) = self.edges.get(&node) else {
                continue;
            };
            for &next in targets.keys() {
                if next == from || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, node);
                if next == to {
                    let mut path = vec![to];
                    let mut cursor = to;
                    while let Some(&prev) = parent.get(&cursor) {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Drops the node and every edge touching it.
    pub(crate) fn remove_node(&mut self, node: K) {
        self.edges.remove(&node);
        self.edges.retain(|_, targets| {
            targets.remove(&node);
            !targets.is_empty()
        });
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (K, K, &EdgeOrigin)> + '_ {
        self.edges.iter().flat_map(|(&from, targets)| {
            targets.iter().map(move |(&to, origin)| (from, to, origin))
        })
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.edges.clear();
    }
}
