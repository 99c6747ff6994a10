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

//! Ingress-only state: per-flow burst-shaping queues, the flow-order FIFO, and the
//! per-flow path/next-hop table.

use std::collections::{HashMap, VecDeque};

use crate::flow::{FlowId, Packet};
use crate::network::NodeId;

/// State an ingress node carries in addition to the shared [`super::node::Node`]
/// fields. A flow is shaped once (via [`IngressState::shape_flow`]) and then drained
/// one cycle queue at a time by `transmit_packets`, one flow fully drained before
/// the next is served (see spec §4.6's pending-flow FIFO).
#[derive(Debug, Default)]
pub struct IngressState {
    /// Per-flow cycle queues, indexed `0..num_cycles`.
    pub(super) per_flow_queues: HashMap<FlowId, Vec<VecDeque<Packet>>>,
    /// Flows awaiting transmission, served strictly in order, one at a time.
    pub(super) flow_order: VecDeque<FlowId>,
    /// Next hop for each flow (the second node of its admitted path).
    pub(super) next_hop: HashMap<FlowId, NodeId>,
    /// Full admitted path for each flow, kept for diagnostics.
    pub(super) paths: HashMap<FlowId, Vec<NodeId>>,
}

impl IngressState {
    /// Record the path an admitted flow will take; `next_hop` is the path's second
    /// node, if any (a path of length 1 — the flow's destination is the ingress
    /// itself — generates no next hop).
    pub fn set_flow_path(&mut self, flow: FlowId, path: Vec<NodeId>) {
        if path.len() > 1 {
            self.next_hop.insert(flow, path[1]);
        }
        self.paths.insert(flow, path);
    }

    /// The recorded path for `flow`, if any.
    pub fn path_of(&self, flow: FlowId) -> Option<&[NodeId]> {
        self.paths.get(&flow).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_hop_path_records_no_next_hop() {
        let mut state = IngressState::default();
        state.set_flow_path(FlowId(1), vec![NodeId(1)]);
        assert!(state.next_hop.get(&FlowId(1)).is_none());
    }

    #[test]
    fn multi_hop_path_records_second_node_as_next_hop() {
        let mut state = IngressState::default();
        state.set_flow_path(FlowId(1), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert_eq!(state.next_hop[&FlowId(1)], NodeId(2));
    }
}
