// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural equality over possibly cyclic graphs.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::value::Value;
use std::collections::HashSet;

/// Whether node `a` of `left` and node `b` of `right` are structurally equal.
///
/// Nodes are equal when they have the same attribute names in the same order
/// and pairwise equal values, comparing referenced nodes the same way. A pair
/// of nodes already under comparison is assumed equal when met again, which
/// makes the check terminate on cyclic graphs. The guard is on the *pair*, so
/// a node revisited against a different partner is still compared.
pub fn equals(left: &Graph, a: NodeId, right: &Graph, b: NodeId) -> bool {
    let mut visited: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut pending = vec![(a, b)];

    while let Some((a, b)) = pending.pop() {
        if !visited.insert((a, b)) {
            continue;
        }
        let (Some(node_a), Some(node_b)) = (left.node(a), right.node(b)) else {
            return false;
        };
        if node_a.len() != node_b.len() {
            return false;
        }

        for ((name_a, value_a), (name_b, value_b)) in node_a.attributes().zip(node_b.attributes()) {
            if name_a != name_b {
                return false;
            }
            match (value_a, value_b) {
                (Value::Node(child_a), Value::Node(child_b)) => pending.push((*child_a, *child_b)),
                (Value::Node(_), _) | (_, Value::Node(_)) => return false,
                _ if value_a != value_b => return false,
                _ => {}
            }
        }
    }
    true
}

/// Negation of [`equals`]
pub fn not_equals(left: &Graph, a: NodeId, right: &Graph, b: NodeId) -> bool {
    !equals(left, a, right, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;

    fn isolated_graph() -> Graph {
        Graph::with_registry(TypeRegistry::new().into_shared())
    }

    #[test]
    fn test_equal_flat_nodes() {
        let mut graph = isolated_graph();
        let a = graph.add_node_with([("x", 1), ("y", 2)]).unwrap();
        let b = graph.add_node_with([("x", 1), ("y", 2)]).unwrap();
        let c = graph.add_node_with([("y", 2), ("x", 1)]).unwrap();
        let d = graph.add_node_with([("x", 1)]).unwrap();

        assert!(equals(&graph, a, &graph, b));
        assert!(not_equals(&graph, a, &graph, c));
        assert!(not_equals(&graph, a, &graph, d));
    }

    #[test]
    fn test_node_versus_scalar() {
        let mut graph = isolated_graph();
        let child = graph.add_node();
        let a = graph.add_node_with([("v", child)]).unwrap();
        let b = graph.add_node_with([("v", 0)]).unwrap();
        assert!(not_equals(&graph, a, &graph, b));
    }

    #[test]
    fn test_mutual_cycles_compare_equal() {
        let mut left = isolated_graph();
        let a = left.add_node();
        let a2 = left.add_node();
        left.set(a, "other", a2).unwrap();
        left.set(a2, "other", a).unwrap();

        let mut right = isolated_graph();
        let b = right.add_node();
        right.set(b, "other", b).unwrap();

        // Unrolled and folded cycles have the same structure
        assert!(equals(&left, a, &right, b));
    }

    #[test]
    fn test_pair_guard_catches_second_cycle() {
        // p = { next: p, v: 1 }
        let mut left = isolated_graph();
        let p = left.add_node();
        left.set(p, "next", p).unwrap();
        left.set(p, "v", 1).unwrap();

        // q = { next: r, v: 1 }, r = { next: r, v: 2 }
        let mut right = isolated_graph();
        let q = right.add_node();
        let r = right.add_node();
        right.set(q, "next", r).unwrap();
        right.set(q, "v", 1).unwrap();
        right.set(r, "next", r).unwrap();
        right.set(r, "v", 2).unwrap();

        // Guarding only on `p` would stop at (p, r) and call these equal
        assert!(not_equals(&left, p, &right, q));
    }
}
