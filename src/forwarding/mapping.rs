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

//! Derives a node's label-remapping table from its neighbors' propagation delays.
//!
//! A packet transmitted in cycle k at the upstream node arrives inside cycle
//! `k + cycles_to_shift` here, so CQF assigns it to the matching cycle queue on its
//! way back out.

use crate::flow::Label;
use crate::network::NodeId;

use super::node::Node;

/// Learn mapping-table entries for packets arriving at `node` from `upstream`.
///
/// `neighbors` is the full set of `node`'s network neighbors. If `out_port` is
/// given, only that single outbound port gets entries (and is skipped entirely if
/// it equals `upstream` — forwarding a packet back the way it came is impossible);
/// otherwise every neighbor other than `upstream` gets entries. A node with no
/// eligible out-port (single-neighbor node receiving from that same neighbor)
/// learns nothing.
pub fn learn_mappings(
    node: &mut Node,
    upstream: NodeId,
    neighbors: &[NodeId],
    cycle_duration_us: f64,
    out_port: Option<NodeId>,
) {
    let propagation_delay_ms = node.link_delay(upstream);
    let cycle_ms = cycle_duration_us / 1000.0;
    let cycles_to_shift = if cycle_ms <= 0.0 {
        0
    } else {
        (propagation_delay_ms / cycle_ms).ceil() as i64
    };

    let out_ports: Vec<NodeId> = match out_port {
        Some(port) => {
            if port == upstream {
                return;
            }
            vec![port]
        }
        None => neighbors.iter().copied().filter(|&n| n != upstream).collect(),
    };

    for port in out_ports {
        for in_label in 0u8..3 {
            let out_label = Label::new(in_label as i64 + cycles_to_shift).value();
            node.add_mapping(upstream, in_label, port, out_label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_zero_delay_yields_identity_mapping() {
        let mut core = Node::new_core(NodeId(2));
        core.set_link_delay(NodeId(1), 0.0);
        learn_mappings(&mut core, NodeId(1), &[NodeId(1), NodeId(3)], 1000.0, None);

        core.set_routing_entry(crate::flow::FlowId(1), NodeId(3));
        let packet = crate::flow::Packet {
            size_kb: 1.0,
            flow_id: crate::flow::FlowId(1),
            label: Label::new(0),
        };
        core.receive_packet(packet, NodeId(1));
        let result = core.transmit_packets();
        assert_eq!(result.forwarded[0].1.label.value(), 0);
    }

    #[test]
    fn one_cycle_delay_shifts_label_by_one() {
        let mut core = Node::new_core(NodeId(2));
        core.set_link_delay(NodeId(1), 1.0);
        learn_mappings(&mut core, NodeId(1), &[NodeId(1), NodeId(3)], 1000.0, None);
        core.set_routing_entry(crate::flow::FlowId(1), NodeId(3));
        let packet = crate::flow::Packet {
            size_kb: 1.0,
            flow_id: crate::flow::FlowId(1),
            label: Label::new(0),
        };
        core.receive_packet(packet, NodeId(1));

        // The shifted label (1) lands in queue 1; the active queue starts at 0, so
        // it takes a second tick of the rotation to reach it.
        let mut forwarded = Vec::new();
        for _ in 0..3 {
            forwarded.extend(core.transmit_packets().forwarded);
            if !forwarded.is_empty() {
                break;
            }
        }
        assert_eq!(forwarded[0].1.label.value(), 1);
    }

    #[test]
    fn single_neighbor_node_learns_nothing_for_that_neighbor() {
        let mut node = Node::new_core(NodeId(2));
        node.set_link_delay(NodeId(1), 1.0);
        learn_mappings(&mut node, NodeId(1), &[NodeId(1)], 1000.0, None);
        node.set_routing_entry(crate::flow::FlowId(1), NodeId(1));
        let packet = crate::flow::Packet {
            size_kb: 1.0,
            flow_id: crate::flow::FlowId(1),
            label: Label::new(0),
        };
        node.receive_packet(packet, NodeId(1));
        let result = node.transmit_packets();
        assert!(result.forwarded.is_empty());
    }

    #[test]
    fn explicit_out_port_equal_to_upstream_is_skipped() {
        let mut node = Node::new_core(NodeId(2));
        node.set_link_delay(NodeId(1), 1.0);
        learn_mappings(&mut node, NodeId(1), &[NodeId(1), NodeId(3)], 1000.0, Some(NodeId(1)));
        node.set_routing_entry(crate::flow::FlowId(1), NodeId(3));
        let packet = crate::flow::Packet {
            size_kb: 1.0,
            flow_id: crate::flow::FlowId(1),
            label: Label::new(0),
        };
        node.receive_packet(packet, NodeId(1));
        let result = node.transmit_packets();
        assert!(result.forwarded.is_empty());
    }
}
