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

//! The admission controller: column generation over (flow, path, shaping) columns,
//! driven by a restricted master LP and a LARAC pricing subproblem, finished off with
//! randomized rounding to an integer admission decision.

pub mod larac;
pub mod pricing;
pub mod rmp;
pub mod rounding;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use log::{debug, info};
use rand::Rng;

use crate::flow::{Flow, FlowId};
use crate::network::{Network, NodeId};

/// A candidate admission: a flow, a path for it, and a burst-shaping parameter.
#[derive(Debug, Clone)]
pub struct Column {
    /// The flow this column admits.
    pub flow: FlowId,
    /// The path the flow would take, `path[0] == flow.src`, `path[last] == flow.dest`.
    pub path: Vec<NodeId>,
    /// The shaping parameter b′, in KB per cycle.
    pub b_prime: f64,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.flow == other.flow && self.path == other.path && self.b_prime.to_bits() == other.b_prime.to_bits()
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flow.hash(state);
        self.path.hash(state);
        self.b_prime.to_bits().hash(state);
    }
}

/// Whether `path`, traversed hop by hop, uses the undirected edge `(u, v)` in either
/// direction.
pub fn path_uses_edge(path: &[NodeId], u: NodeId, v: NodeId) -> bool {
    path.windows(2)
        .any(|hop| (hop[0] == u && hop[1] == v) || (hop[0] == v && hop[1] == u))
}

/// Outcome of the admission controller: for every admitted flow, the path and
/// shaping parameter it was given.
#[derive(Debug, Default)]
pub struct AdmissionPlan {
    /// Admitted flows, mapping flow id to `(path, b_prime)`.
    pub admitted: HashMap<FlowId, (Vec<NodeId>, f64)>,
    /// Every column considered during column generation (admitted or not),
    /// preserved for diagnostics and testing.
    pub columns: Vec<Column>,
}

impl AdmissionPlan {
    /// Whether `flow` was admitted.
    pub fn is_admitted(&self, flow: FlowId) -> bool {
        self.admitted.contains_key(&flow)
    }
}

/// Run column generation to convergence (or until `max_cg_iterations` is hit), then
/// randomized rounding for `max_rounding_rounds` rounds, and return the resulting
/// admission plan.
#[allow(clippy::too_many_arguments)]
pub fn run(
    network: &Network,
    flows: &[Flow],
    cycle_duration_us: f64,
    node_delays: &HashMap<NodeId, f64>,
    max_cg_iterations: usize,
    max_rounding_rounds: usize,
    rng: &mut impl Rng,
) -> AdmissionPlan {
    let flows_by_id: HashMap<FlowId, Flow> = flows.iter().map(|f| (f.id, f.clone())).collect();
    let mut columns: Vec<Column> = Vec::new();

    for iteration in 0..max_cg_iterations {
        let rmp_solution = rmp::solve_rmp(&columns, network, &flows_by_id, cycle_duration_us);
        let mut added = false;
        for flow in flows {
            if let Some(col) = pricing::price_flow(
                flow,
                network,
                &rmp_solution.duals,
                cycle_duration_us,
                node_delays,
            ) {
                if !columns.contains(&col) {
                    debug!(
                        "column generation: new column for flow {} via {:?} at b'={}",
                        col.flow, col.path, col.b_prime
                    );
                    columns.push(col);
                    added = true;
                }
            }
        }
        if !added {
            info!("column generation converged after {} iteration(s)", iteration + 1);
            break;
        }
    }

    // Resolve once more so the primal vector always matches the final column set,
    // even if the iteration cap (rather than natural convergence) ended the loop.
    let rmp_solution = rmp::solve_rmp(&columns, network, &flows_by_id, cycle_duration_us);

    let rates: Vec<f64> = columns
        .iter()
        .map(|c| flows_by_id[&c.flow].arrival_rate_mbps)
        .collect();

    let selected = rounding::randomized_round(
        &columns,
        &rates,
        &rmp_solution.primal,
        network,
        cycle_duration_us,
        max_rounding_rounds,
        rng,
    );

    let mut admitted = HashMap::new();
    for idx in selected {
        let col = &columns[idx];
        admitted.insert(col.flow, (col.path.clone(), col.b_prime));
    }

    info!(
        "admission complete: {}/{} flows admitted",
        admitted.len(),
        flows.len()
    );

    AdmissionPlan { admitted, columns }
}
