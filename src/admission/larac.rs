// cqf-sim: deterministic CQF admission-control and forwarding simulator
// Copyright (C) 2024 The cqf-sim authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! LARAC: Lagrangian Relaxation-based constrained shortest path.
//!
//! Given a graph with per-edge dual costs and a delay budget, find a min-cost
//! source-to-sink path whose total delay does not exceed the budget, via binary
//! search on the Lagrange multiplier λ. `petgraph::algo::dijkstra` does not carry
//! predecessor information out, so the inner shortest-path routine is written
//! directly against [`Network`]'s adjacency, in the style of `bgpsim::ospf`'s
//! hand-rolled shortest-path code.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::AdmissionError;
use crate::network::{NodeId, Network};

/// Number of bisection steps used to search for the optimal λ.
const LAMBDA_ITERATIONS: u32 = 50;
/// Upper bound of the λ search interval.
const LAMBDA_MAX: f64 = 1e6;

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: NodeId,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on `cost`.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra's algorithm over `network` with edge weight `weight(u, v)`, returning the
/// shortest path from `source` to `sink` (inclusive of both endpoints), or `None` if
/// they are disconnected.
fn shortest_path(
    network: &Network,
    source: NodeId,
    sink: NodeId,
    weight: impl Fn(NodeId, NodeId) -> f64,
) -> Option<Vec<NodeId>> {
    let mut dist: HashMap<NodeId, f64> = HashMap::new();
    let mut prev: HashMap<NodeId, NodeId> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(source, 0.0);
    heap.push(HeapEntry { cost: 0.0, node: source });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if node == sink {
            break;
        }
        if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
            continue;
        }
        for next in network.neighbors(node) {
            let next_cost = cost + weight(node, next);
            if next_cost < *dist.get(&next).unwrap_or(&f64::INFINITY) {
                dist.insert(next, next_cost);
                prev.insert(next, node);
                heap.push(HeapEntry { cost: next_cost, node: next });
            }
        }
    }

    if !dist.contains_key(&sink) {
        return None;
    }

    let mut path = vec![sink];
    let mut cur = sink;
    while cur != source {
        cur = *prev.get(&cur)?;
        path.push(cur);
    }
    path.reverse();
    Some(path)
}

/// Total propagation delay (ms) along `path`.
fn path_delay(network: &Network, path: &[NodeId]) -> f64 {
    path.windows(2).map(|hop| network.delay(hop[0], hop[1])).sum()
}

/// Total dual cost along `path`, looking up `dual_costs` symmetrically (an edge's
/// dual applies regardless of the direction the path traverses it).
fn path_cost(path: &[NodeId], dual_costs: &HashMap<(NodeId, NodeId), f64>) -> f64 {
    path.windows(2)
        .map(|hop| edge_cost(hop[0], hop[1], dual_costs))
        .sum()
}

fn edge_cost(u: NodeId, v: NodeId, dual_costs: &HashMap<(NodeId, NodeId), f64>) -> f64 {
    dual_costs
        .get(&(u, v))
        .or_else(|| dual_costs.get(&(v, u)))
        .copied()
        .unwrap_or(0.0)
}

/// Run LARAC: find the minimum dual-cost path from `source` to `sink` whose total
/// propagation delay does not exceed `delay_budget_ms`.
///
/// Returns [`AdmissionError::NoPath`] if the endpoints are disconnected, or
/// [`AdmissionError::Infeasible`] (tagged with `flow`, supplied by the caller via
/// `infeasible_flow`) if even the delay-minimal path exceeds the budget.
pub fn larac(
    network: &Network,
    source: NodeId,
    sink: NodeId,
    delay_budget_ms: f64,
    dual_costs: &HashMap<(NodeId, NodeId), f64>,
    infeasible_flow: crate::flow::FlowId,
) -> Result<Vec<NodeId>, AdmissionError> {
    if shortest_path(network, source, sink, |u, v| network.delay(u, v)).is_none() {
        return Err(AdmissionError::NoPath { src: source, dest: sink });
    }

    let mut lambda_low = 0.0;
    let mut lambda_high = LAMBDA_MAX;
    let mut best_path: Option<Vec<NodeId>> = None;

    for _ in 0..LAMBDA_ITERATIONS {
        let lambda_mid = (lambda_low + lambda_high) / 2.0;
        let path = shortest_path(network, source, sink, |u, v| {
            edge_cost(u, v, dual_costs) + lambda_mid * network.delay(u, v)
        })
        .expect("source and sink are known connected");
        let delay = path_delay(network, &path);
        if delay <= delay_budget_ms {
            best_path = Some(path);
            lambda_high = lambda_mid;
        } else {
            lambda_low = lambda_mid;
        }
    }

    best_path.ok_or(AdmissionError::Infeasible { flow: infeasible_flow })
}

/// Dual cost of `path` under `dual_costs` — exposed for the pricing subproblem, which
/// needs the column's reduced cost after LARAC has returned a path.
pub fn cost_of(path: &[NodeId], dual_costs: &HashMap<(NodeId, NodeId), f64>) -> f64 {
    path_cost(path, dual_costs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowId;

    fn triangle() -> Network {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 100.0);
        net.add_link(NodeId(2), NodeId(3), 1.0, 100.0);
        net.add_link(NodeId(1), NodeId(3), 10.0, 100.0);
        net
    }

    #[test]
    fn picks_the_hop_path_when_direct_link_violates_delay() {
        let net = triangle();
        let duals = HashMap::new();
        let path = larac(&net, NodeId(1), NodeId(3), 5.0, &duals, FlowId(1)).unwrap();
        assert_eq!(path, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn disconnected_endpoints_report_no_path() {
        let mut net = triangle();
        net.add_node(NodeId(99));
        let duals = HashMap::new();
        let err = larac(&net, NodeId(1), NodeId(99), 100.0, &duals, FlowId(1)).unwrap_err();
        assert_eq!(err, AdmissionError::NoPath { src: NodeId(1), dest: NodeId(99) });
    }

    #[test]
    fn impossible_budget_reports_infeasible() {
        let net = triangle();
        let duals = HashMap::new();
        let err = larac(&net, NodeId(1), NodeId(3), 0.01, &duals, FlowId(7)).unwrap_err();
        assert_eq!(err, AdmissionError::Infeasible { flow: FlowId(7) });
    }

    #[test]
    fn single_hop_path_has_length_two() {
        let net = triangle();
        let duals = HashMap::new();
        let path = larac(&net, NodeId(1), NodeId(2), 100.0, &duals, FlowId(1)).unwrap();
        assert_eq!(path.len(), 2);
    }
}
