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

//! The per-node state machine: three rotating cycle queues, the learned label
//! mapping table, the routing table, and role-dependent `receive_packet`/
//! `transmit_packets` behavior.
//!
//! `transmit_packets` never calls into a neighbor directly — it returns the packets
//! that should be handed off, leaving the send itself to the caller (`sim.rs`'s
//! per-node runtime). This is the fix for spec §9's reentrancy hazard: the node
//! never needs to reach across another node's lock while holding its own.

use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};

use super::ingress::IngressState;
use crate::flow::{Flow, FlowId, Label, Packet};
use crate::network::NodeId;

/// Which role a node plays. Ingress nodes additionally carry per-flow shaping
/// state; core (and destination) nodes share one code path, matching spec §9's
/// recommendation to dispatch on a discriminant rather than modeling inheritance.
#[derive(Debug)]
pub enum NodeRole {
    /// An intermediate or destination node: forwards via the mapping/routing
    /// tables, or absorbs the packet if it has no routing entry for the flow.
    Core,
    /// A flow's entry point into the network.
    Ingress(IngressState),
}

/// Outcome of one `transmit_packets()` call.
#[derive(Debug, Default)]
pub struct TransmitResult {
    /// Packets to hand off to `(next_hop, packet)`.
    pub forwarded: Vec<(NodeId, Packet)>,
    /// Packets that reached a dead end (no routing entry) and were dropped.
    pub terminated: usize,
    /// Set when an ingress node has just drained a flow's final cycle.
    pub completed_flow: Option<FlowId>,
}

/// A node in the network: its cycle queues, mapping table, routing table, and role.
#[derive(Debug)]
pub struct Node {
    /// This node's identifier.
    pub id: NodeId,
    /// Core or ingress behavior.
    pub role: NodeRole,
    queues: [HashMap<NodeId, VecDeque<Packet>>; 3],
    active_queue_index: usize,
    current_cycle: u64,
    mapping: HashMap<(NodeId, u8), Vec<(NodeId, u8)>>,
    routing: HashMap<FlowId, NodeId>,
    link_delays: HashMap<NodeId, f64>,
    queuing_delay: f64,
}

impl Node {
    /// A new core node with empty state.
    pub fn new_core(id: NodeId) -> Self {
        Node {
            id,
            role: NodeRole::Core,
            queues: Default::default(),
            active_queue_index: 0,
            current_cycle: 0,
            mapping: HashMap::new(),
            routing: HashMap::new(),
            link_delays: HashMap::new(),
            queuing_delay: 0.0,
        }
    }

    /// A new ingress node with empty state.
    pub fn new_ingress(id: NodeId) -> Self {
        Node {
            role: NodeRole::Ingress(IngressState::default()),
            ..Node::new_core(id)
        }
    }

    /// Whether this node is an ingress.
    pub fn is_ingress(&self) -> bool {
        matches!(self.role, NodeRole::Ingress(_))
    }

    /// Record the propagation delay to `neighbor`, used by the mapping learner.
    pub fn set_link_delay(&mut self, neighbor: NodeId, delay_ms: f64) {
        self.link_delays.insert(neighbor, delay_ms);
    }

    /// The recorded propagation delay to `neighbor`, or 0.0 if unknown.
    pub fn link_delay(&self, neighbor: NodeId) -> f64 {
        self.link_delays.get(&neighbor).copied().unwrap_or(0.0)
    }

    /// Override this node's computed tau with a configured queuing delay.
    pub fn set_queuing_delay(&mut self, delay_ms: f64) {
        self.queuing_delay = delay_ms;
    }

    /// This node's queuing delay (tau, possibly overridden).
    pub fn queuing_delay(&self) -> f64 {
        self.queuing_delay
    }

    /// Set the next hop a flow should take from this node.
    pub fn set_routing_entry(&mut self, flow: FlowId, next_hop: NodeId) {
        self.routing.insert(flow, next_hop);
    }

    /// Add a mapping-table entry `(in_port, in_label) -> (out_port, out_label)`,
    /// deduplicating repeated entries for the same key.
    pub fn add_mapping(&mut self, in_port: NodeId, in_label: u8, out_port: NodeId, out_label: u8) {
        let entries = self.mapping.entry((in_port, in_label)).or_default();
        let candidate = (out_port, out_label);
        if !entries.contains(&candidate) {
            entries.push(candidate);
        }
    }

    /// Record the full admitted path for a flow on an ingress node; a no-op on a
    /// core node.
    pub fn set_flow_path(&mut self, flow: FlowId, path: Vec<NodeId>) {
        if let NodeRole::Ingress(state) = &mut self.role {
            state.set_flow_path(flow, path);
        }
    }

    /// Shape `flow`'s burst into `ceil(burst_size / b_prime)` per-cycle queues and
    /// enqueue it onto the pending-flow FIFO. A no-op on a core node.
    ///
    /// The wire-visible `Packet::label` is always reduced modulo 3 (the label space
    /// every downstream mapping table is keyed on); the per-cycle bucket a packet
    /// lands in during shaping is a separate, unbounded `i mod num_cycles` index
    /// local to this ingress's own queue array.
    pub fn shape_flow(&mut self, flow: &Flow, b_prime: f64) {
        let NodeRole::Ingress(state) = &mut self.role else {
            return;
        };

        let num_cycles = (flow.burst_size_kb / b_prime).ceil().max(1.0) as usize;
        let mut cycle_queues: Vec<VecDeque<Packet>> = (0..num_cycles).map(|_| VecDeque::new()).collect();

        for (i, mut packet) in flow.generate_packets().into_iter().enumerate() {
            let bucket = i % num_cycles;
            packet.label = Label::new(bucket as i64);
            cycle_queues[bucket].push_back(packet);
        }

        state.per_flow_queues.insert(flow.id, cycle_queues);
        state.flow_order.push_back(flow.id);
    }

    /// Handle an incoming packet. Ingress nodes are always the final destination of
    /// any packet they receive (they never sit on a transit path), so they simply
    /// record delivery; core nodes consult the routing and mapping tables.
    pub fn receive_packet(&mut self, packet: Packet, in_port: NodeId) {
        match self.role {
            NodeRole::Ingress(_) => {
                info!(
                    "node {}: flow {} delivered from {} (destination)",
                    self.id, packet.flow_id, in_port
                );
            }
            NodeRole::Core => self.receive_packet_core(packet, in_port),
        }
    }

    fn receive_packet_core(&mut self, mut packet: Packet, in_port: NodeId) {
        let Some(&next_hop) = self.routing.get(&packet.flow_id) else {
            info!(
                "node {}: flow {} delivered from {} (destination)",
                self.id, packet.flow_id, in_port
            );
            return;
        };

        let in_label = packet.label.value();
        let options = match self.mapping.get(&(in_port, in_label)) {
            Some(opts) if !opts.is_empty() => opts,
            _ => {
                warn!(
                    "node {}: no mapping for (in_port={}, in_label={}); dropping packet of flow {}",
                    self.id, in_port, in_label, packet.flow_id
                );
                return;
            }
        };

        let &(out_port, out_label) = options
            .iter()
            .find(|&&(port, _)| port == next_hop)
            .unwrap_or(&options[0]);

        packet.label = Label::new(out_label as i64);
        let queue_index = (out_label % 3) as usize;
        debug!(
            "node {}: flow {} from {} label {} -> out_port {} label {} (queue {})",
            self.id, packet.flow_id, in_port, in_label, out_port, out_label, queue_index
        );
        self.queues[queue_index].entry(out_port).or_default().push_back(packet);
    }

    /// Advance this node by one cycle tick, draining whatever is ready to go out.
    pub fn transmit_packets(&mut self) -> TransmitResult {
        match &self.role {
            NodeRole::Core => self.transmit_core(),
            NodeRole::Ingress(_) => self.transmit_ingress(),
        }
    }

    fn transmit_core(&mut self) -> TransmitResult {
        let mut result = TransmitResult::default();
        let index = self.active_queue_index;
        let out_ports: Vec<NodeId> = self.queues[index].keys().copied().collect();
        for out_port in out_ports {
            if let Some(queue) = self.queues[index].get_mut(&out_port) {
                while let Some(packet) = queue.pop_front() {
                    match self.routing.get(&packet.flow_id).copied() {
                        Some(next_hop) => result.forwarded.push((next_hop, packet)),
                        None => result.terminated += 1,
                    }
                }
            }
        }
        self.active_queue_index = (self.active_queue_index + 1) % 3;
        self.current_cycle += 1;
        result
    }

    fn transmit_ingress(&mut self) -> TransmitResult {
        let mut result = TransmitResult::default();
        let current_cycle = self.current_cycle;
        let NodeRole::Ingress(state) = &mut self.role else {
            unreachable!("transmit_ingress called on a non-ingress node");
        };

        let Some(&flow_id) = state.flow_order.front() else {
            return result;
        };

        let Some(cycle_queues) = state.per_flow_queues.get_mut(&flow_id) else {
            state.flow_order.pop_front();
            return result;
        };

        let num_cycles = cycle_queues.len();
        let queue_index = (current_cycle as usize) % num_cycles;
        while let Some(packet) = cycle_queues[queue_index].pop_front() {
            match state.next_hop.get(&flow_id).copied() {
                Some(next_hop) => result.forwarded.push((next_hop, packet)),
                None => result.terminated += 1,
            }
        }

        if queue_index == num_cycles - 1 {
            state.flow_order.pop_front();
            state.per_flow_queues.remove(&flow_id);
            self.current_cycle = 0;
            result.completed_flow = Some(flow_id);
        } else {
            self.current_cycle += 1;
        }

        result
    }
}
