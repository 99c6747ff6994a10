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

//! The network topology: an undirected graph of links carrying a propagation delay
//! (ms) and a bandwidth, plus the per-node τ (tau) residual-wait computation.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

/// Identifier of a node in the network, as given in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attributes of a single link, stored once per undirected edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkWeight {
    /// Propagation delay of the link, in milliseconds.
    pub delay_ms: f64,
    /// Bandwidth of the link. Its product with the cycle duration (in the same time
    /// unit) yields the per-cycle capacity in KB.
    pub bandwidth: f64,
}

/// The network topology: nodes plus undirected, delay/bandwidth-annotated links.
///
/// Every `(u, v)` lookup also resolves as `(v, u)`: the underlying storage is a
/// `petgraph::UnGraph`, so edge lookups are inherently symmetric.
#[derive(Debug, Clone, Default)]
pub struct Network {
    graph: UnGraph<NodeId, LinkWeight>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Network {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it is not already present.
    pub fn add_node(&mut self, id: NodeId) -> NodeIndex {
        *self
            .index
            .entry(id)
            .or_insert_with(|| self.graph.add_node(id))
    }

    /// Add an undirected link between `a` and `b`. Adding nodes implicitly if they
    /// are not yet present.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, delay_ms: f64, bandwidth: f64) {
        let ia = self.add_node(a);
        let ib = self.add_node(b);
        self.graph.update_edge(ia, ib, LinkWeight { delay_ms, bandwidth });
    }

    /// All node ids, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(|i| self.graph[i])
    }

    /// Whether `id` is a known node.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Neighbors of `node` (nodes reachable via a single link), in arbitrary but
    /// deterministic (edge-insertion) order.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        match self.index.get(&node) {
            Some(&idx) => self
                .graph
                .neighbors(idx)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// The link weight between `a` and `b`, checking both directions.
    pub fn link(&self, a: NodeId, b: NodeId) -> Option<LinkWeight> {
        let (&ia, &ib) = (self.index.get(&a)?, self.index.get(&b)?);
        self.graph
            .find_edge(ia, ib)
            .map(|e| self.graph[e])
    }

    /// Propagation delay (ms) between `a` and `b`, or 0.0 if they are not directly
    /// connected (matching the Python source's `.get(link, 0.0)` default in
    /// `calculate_overall_delay`).
    pub fn delay(&self, a: NodeId, b: NodeId) -> f64 {
        self.link(a, b).map(|l| l.delay_ms).unwrap_or(0.0)
    }

    /// Bandwidth of the link between `a` and `b`, or 0.0 if absent.
    pub fn bandwidth(&self, a: NodeId, b: NodeId) -> f64 {
        self.link(a, b).map(|l| l.bandwidth).unwrap_or(0.0)
    }

    /// All undirected edges, each reported once as `(a, b)`.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
            .collect()
    }

    /// τ (tau) for a specific upstream→downstream pair: the residual wait, in ms,
    /// from the end of packet reception to the start of the next cycle boundary at
    /// the downstream node. Returns `None` if the nodes are not directly connected.
    ///
    /// `cycle_duration_us` is the cycle duration T, in microseconds.
    pub fn tau(&self, upstream: NodeId, downstream: NodeId, cycle_duration_us: f64) -> Option<f64> {
        let delay_ms = self.link(upstream, downstream)?.delay_ms;
        let propagation_delay_us = delay_ms * 1000.0;
        let reception_end_us = propagation_delay_us + cycle_duration_us;
        let cycle_number = (reception_end_us / cycle_duration_us).ceil();
        let next_cycle_start_us = cycle_number * cycle_duration_us;
        let mut tau_us = next_cycle_start_us - reception_end_us;
        if tau_us < 0.0 {
            tau_us += cycle_duration_us;
        }
        Some(tau_us / 1000.0)
    }

    /// τ for every node, averaged over all of its upstream neighbors. A node with no
    /// neighbors has τ = 0.0.
    pub fn tau_values(&self, cycle_duration_us: f64) -> HashMap<NodeId, f64> {
        self.nodes()
            .map(|node| {
                let neighbors = self.neighbors(node);
                if neighbors.is_empty() {
                    return (node, 0.0);
                }
                let sum: f64 = neighbors
                    .iter()
                    .filter_map(|&up| self.tau(up, node, cycle_duration_us))
                    .sum();
                (node, sum / neighbors.len() as f64)
            })
            .collect()
    }

    /// Per-node delay to feed [`overall_delay`]: every node's computed τ, with
    /// `overrides` (typically a config's `queuing_delays`) replacing rather than
    /// blending with the computed value for the nodes it names.
    pub fn effective_node_delays(
        &self,
        cycle_duration_us: f64,
        overrides: &HashMap<NodeId, f64>,
    ) -> HashMap<NodeId, f64> {
        let mut delays = self.tau_values(cycle_duration_us);
        for (&node, &delay) in overrides {
            delays.insert(node, delay);
        }
        delays
    }
}

/// Total delay (ms) for traversing `path`, as the sum over each hop of propagation
/// delay plus the downstream node's τ (or config-overridden queuing delay) plus one
/// cycle duration (converted from µs to ms).
pub fn overall_delay(
    network: &Network,
    path: &[NodeId],
    cycle_duration_us: f64,
    node_delays: &HashMap<NodeId, f64>,
) -> f64 {
    let cycle_ms = cycle_duration_us / 1000.0;
    path.windows(2)
        .map(|hop| {
            let (u, v) = (hop[0], hop[1]);
            network.delay(u, v) + node_delays.get(&v).copied().unwrap_or(0.0) + cycle_ms
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Network {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 100.0);
        net
    }

    #[test]
    fn edge_lookup_is_symmetric() {
        let net = line();
        assert_eq!(net.delay(NodeId(1), NodeId(2)), net.delay(NodeId(2), NodeId(1)));
        assert_eq!(net.bandwidth(NodeId(1), NodeId(2)), 100.0);
    }

    #[test]
    fn tau_is_zero_for_near_zero_delay_cycle_aligned() {
        let net = line();
        // With near-zero propagation delay and T chosen so reception ends exactly on
        // a cycle boundary, tau should be 0.
        let tau = net.tau(NodeId(1), NodeId(2), 1000.0).unwrap();
        assert!(tau >= 0.0 && tau < 1.0);
    }

    #[test]
    fn tau_values_average_multiple_upstreams() {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 100.0);
        net.add_link(NodeId(3), NodeId(2), 2.0, 100.0);
        let taus = net.tau_values(1000.0);
        let t12 = net.tau(NodeId(1), NodeId(2), 1000.0).unwrap();
        let t32 = net.tau(NodeId(3), NodeId(2), 1000.0).unwrap();
        assert!((taus[&NodeId(2)] - (t12 + t32) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn isolated_node_has_zero_tau() {
        let mut net = line();
        net.add_node(NodeId(99));
        let taus = net.tau_values(1000.0);
        assert_eq!(taus[&NodeId(99)], 0.0);
    }

    #[test]
    fn overall_delay_sums_hops() {
        let net = line();
        let node_delays = HashMap::new();
        let d = overall_delay(&net, &[NodeId(1), NodeId(2)], 1000.0, &node_delays);
        assert!((d - (1.0 + 0.0 + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn effective_node_delays_override_wins_over_computed_tau() {
        let net = line();
        let computed = net.tau_values(1000.0);
        let mut overrides = HashMap::new();
        overrides.insert(NodeId(2), 9.0);
        let effective = net.effective_node_delays(1000.0, &overrides);
        assert_eq!(effective[&NodeId(2)], 9.0);
        assert_eq!(effective[&NodeId(1)], computed[&NodeId(1)]);
    }
}
