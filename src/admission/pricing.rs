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

//! The per-flow pricing subproblem: pick the cheapest (path, shaping) combination
//! for a flow that still meets its end-to-end delay bound under the current dual
//! costs.

use std::collections::HashMap;

use crate::admission::{larac, Column};
use crate::flow::{enumerate_shaping, Flow};
use crate::network::{overall_delay, Network, NodeId};

const COST_EPS: f64 = 1e-9;

/// Price `flow` against the current edge duals. Tries every feasible burst-shaping
/// parameter, runs LARAC for each to find the cheapest path within the resulting
/// delay budget, and keeps the overall cheapest (path, b′) pair whose shaping delay
/// plus path delay still respects `flow.max_e2e_delay_ms`.
///
/// Ties in cost are broken in favor of the smaller shaping parameter, since a
/// smaller b′ consumes less capacity in the restricted master problem.
///
/// Returns `None` if no shaping parameter yields a feasible column.
pub fn price_flow(
    flow: &Flow,
    network: &Network,
    duals: &HashMap<(NodeId, NodeId), f64>,
    cycle_duration_us: f64,
    node_delays: &HashMap<NodeId, f64>,
) -> Option<Column> {
    let cycle_ms = cycle_duration_us / 1000.0;
    let mut best: Option<(Vec<NodeId>, f64, f64)> = None;

    for b_prime in enumerate_shaping(flow, cycle_duration_us) {
        let shaping_delay = (flow.burst_size_kb / b_prime).ceil() * cycle_ms + cycle_ms;
        let delay_budget = flow.max_e2e_delay_ms - shaping_delay;
        if delay_budget < 0.0 {
            continue;
        }

        let path = match larac::larac(network, flow.src, flow.dest, delay_budget, duals, flow.id) {
            Ok(p) => p,
            Err(_) => continue,
        };

        let path_delay = overall_delay(network, &path, cycle_duration_us, node_delays);
        if shaping_delay + path_delay > flow.max_e2e_delay_ms {
            continue;
        }

        let cost = larac::cost_of(&path, duals);
        let replace = match &best {
            None => true,
            Some((_, best_b_prime, best_cost)) => {
                cost < best_cost - COST_EPS
                    || ((cost - best_cost).abs() <= COST_EPS && b_prime < *best_b_prime)
            }
        };
        if replace {
            best = Some((path, b_prime, cost));
        }
    }

    best.map(|(path, b_prime, _)| Column {
        flow: flow.id,
        path,
        b_prime,
    })
}
