//! Directed graph with cycle detection.
//!
//! Used for both the member graph of a composite (keyed by component id) and
//! the link graph of a machine (keyed by composite name). Adjacency is kept in
//! ordered maps so traversals and topological orders are deterministic.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Adjacency-set graph over node keys `K`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedGraph<K: Ord + Clone> {
    edges: BTreeMap<K, BTreeSet<K>>,
}

impl<K: Ord + Clone> DirectedGraph<K> {
    /// An empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }

    /// Add a node with no edges. No-op if present.
    pub fn add_node(&mut self, node: K) {
        self.edges.entry(node).or_default();
    }

    /// Remove a node and every edge touching it. Returns the number of edges
    /// removed, or `None` if the node was absent.
    pub fn remove_node(&mut self, node: &K) -> Option<usize> {
        let outgoing = self.edges.remove(node)?.len();
        let mut incoming = 0;
        for targets in self.edges.values_mut() {
            if targets.remove(node) {
                incoming += 1;
            }
        }
        Some(outgoing + incoming)
    }

    /// Whether `node` is in the graph.
    #[must_use]
    pub fn contains_node(&self, node: &K) -> bool {
        self.edges.contains_key(node)
    }

    /// Whether the edge `source -> target` exists.
    #[must_use]
    pub fn contains_edge(&self, source: &K, target: &K) -> bool {
        self.edges
            .get(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Insert `source -> target` without any cycle check, adding missing
    /// nodes. Returns `false` if the edge already existed.
    pub fn add_edge(&mut self, source: K, target: K) -> bool {
        self.add_node(target.clone());
        self.edges.entry(source).or_default().insert(target)
    }

    /// Remove `source -> target`. Returns `false` if it was absent.
    pub fn remove_edge(&mut self, source: &K, target: &K) -> bool {
        self.edges
            .get_mut(source)
            .is_some_and(|targets| targets.remove(target))
    }

    /// Direct successors of `node`.
    pub fn successors<'a>(&'a self, node: &K) -> impl Iterator<Item = &'a K> + 'a {
        self.edges.get(node).into_iter().flatten()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Shortest path `from -> ... -> to` over existing edges, inclusive of
    /// both ends. Breadth-first, O(V+E).
    #[must_use]
    pub fn path(&self, from: &K, to: &K) -> Option<Vec<K>> {
        if !self.contains_node(from) {
            return None;
        }
        if from == to {
            return Some(vec![from.clone()]);
        }

        let mut previous: BTreeMap<&K, &K> = BTreeMap::new();
        let mut visited: BTreeSet<&K> = BTreeSet::from([from]);
        let mut queue: VecDeque<&K> = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            for next in self.successors(node) {
                if !visited.insert(next) {
                    continue;
                }
                previous.insert(next, node);
                if next == to {
                    let mut path = vec![next.clone()];
                    let mut cursor = next;
                    while let Some(prior) = previous.get(cursor) {
                        path.push((*prior).clone());
                        cursor = *prior;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// The cycle that adding `source -> target` would close, if any.
    ///
    /// The returned path starts and ends at `source`:
    /// `source -> target -> ... -> source`. A self-loop yields
    /// `[source, source]`.
    #[must_use]
    pub fn cycle_through(&self, source: &K, target: &K) -> Option<Vec<K>> {
        if source == target {
            return Some(vec![source.clone(), source.clone()]);
        }
        let back = self.path(target, source)?;
        let mut cycle = Vec::with_capacity(back.len() + 1);
        cycle.push(source.clone());
        cycle.extend(back);
        Some(cycle)
    }

    /// Nodes ordered so every edge points forward (Kahn's algorithm, ties
    /// broken by key order). Returns `None` if the graph has a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<K>> {
        let mut indegree: BTreeMap<&K, usize> = self.edges.keys().map(|k| (k, 0)).collect();
        for targets in self.edges.values() {
            for target in targets {
                *indegree.entry(target).or_default() += 1;
            }
        }

        let mut ready: BTreeSet<&K> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(k, _)| *k)
            .collect();
        let mut order = Vec::with_capacity(indegree.len());

        while let Some(node) = ready.pop_first() {
            order.push(node.clone());
            for next in self.successors(node) {
                if let Some(degree) = indegree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(next);
                    }
                }
            }
        }

        (order.len() == indegree.len()).then_some(order)
    }
}

impl<K: Ord + Clone> Default for DirectedGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}
