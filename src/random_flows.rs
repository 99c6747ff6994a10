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

//! Synthetic flow generation for `--random N`.

use rand::Rng;

use crate::flow::{Flow, FlowId};
use crate::network::NodeId;

/// Generate `count` flows with randomized parameters, each between two distinct
/// nodes drawn from `nodes`. A source with no other node to pair with is skipped,
/// so the result may have fewer than `count` entries for a single-node topology.
pub fn generate_random_flows(count: usize, nodes: &[NodeId], rng: &mut impl Rng) -> Vec<Flow> {
    let mut flows = Vec::with_capacity(count);
    for i in 1..=count as u32 {
        let Some(&src) = nodes.get(rng.gen_range(0..nodes.len())) else {
            break;
        };
        let candidates: Vec<NodeId> = nodes.iter().copied().filter(|&n| n != src).collect();
        if candidates.is_empty() {
            log::warn!("cannot generate flow {i}: no valid destination for source {src}");
            continue;
        }
        let dest = candidates[rng.gen_range(0..candidates.len())];

        let arrival_rate_mbps = rng.gen_range(5.0..=15.0);
        let max_pkt_size_kb = rng.gen_range(1.0..=2.0);
        let num_packets = rng.gen_range(3..=8);
        let burst_size_kb = num_packets as f64 * max_pkt_size_kb;
        let max_e2e_delay_ms = rng.gen_range(30.0..=70.0);

        flows.push(Flow {
            id: FlowId(i),
            arrival_rate_mbps,
            burst_size_kb,
            max_e2e_delay_ms,
            max_pkt_size_kb,
            src,
            dest,
        });
    }
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generates_the_requested_count_with_distinct_endpoints() {
        let nodes = vec![NodeId(1), NodeId(2), NodeId(3)];
        let mut rng = StdRng::seed_from_u64(0);
        let flows = generate_random_flows(10, &nodes, &mut rng);
        assert_eq!(flows.len(), 10);
        for f in &flows {
            assert_ne!(f.src, f.dest);
            assert!((5.0..=15.0).contains(&f.arrival_rate_mbps));
            assert!((1.0..=2.0).contains(&f.max_pkt_size_kb));
            assert!((30.0..=70.0).contains(&f.max_e2e_delay_ms));
        }
    }

    #[test]
    fn single_node_topology_yields_no_flows() {
        let nodes = vec![NodeId(1)];
        let mut rng = StdRng::seed_from_u64(0);
        let flows = generate_random_flows(5, &nodes, &mut rng);
        assert!(flows.is_empty());
    }

    #[test]
    fn flow_ids_are_sequential_starting_at_one() {
        let nodes = vec![NodeId(1), NodeId(2)];
        let mut rng = StdRng::seed_from_u64(1);
        let flows = generate_random_flows(3, &nodes, &mut rng);
        let ids: Vec<u32> = flows.iter().map(|f| f.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
