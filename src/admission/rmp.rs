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

//! The restricted master problem: maximize admitted throughput over the current
//! column set subject to per-edge capacity, `0 <= z_k <= 1`.
//!
//! `good_lp` (the LP crate otherwise used in this codebase's lineage) cannot report
//! dual/shadow-price values from any of its backends, and column generation needs
//! exact duals to price new columns and to certify convergence. So this is a
//! hand-written bounded-variable primal simplex (Dantzig's method restricted to box
//! constraints `0 <= z_k <= 1`), which reads duals straight off the optimal
//! tableau's reduced costs on the slack columns.

use std::collections::HashMap;

use crate::flow::{Flow, FlowId};
use crate::network::{Network, NodeId};

use super::{path_uses_edge, Column};

/// Solution to one restricted master problem solve.
#[derive(Debug, Clone, Default)]
pub struct RmpSolution {
    /// Fractional admission value `z_k` for each column, aligned by index with the
    /// column slice the solve was given.
    pub primal: Vec<f64>,
    /// Non-negative shadow price per edge.
    pub duals: HashMap<(NodeId, NodeId), f64>,
}

/// Solve the restricted master problem over `columns`. With no columns, returns the
/// trivial all-zero solution with every dual at 0.0.
pub fn solve_rmp(
    columns: &[Column],
    network: &Network,
    flows: &HashMap<FlowId, Flow>,
    cycle_duration_us: f64,
) -> RmpSolution {
    let edges = network.edges();

    if columns.is_empty() {
        return RmpSolution {
            primal: Vec::new(),
            duals: edges.into_iter().map(|e| (e, 0.0)).collect(),
        };
    }

    let capacities: Vec<f64> = edges
        .iter()
        .map(|&(u, v)| network.bandwidth(u, v) * cycle_duration_us)
        .collect();

    let objective: Vec<f64> = columns
        .iter()
        .map(|col| flows[&col.flow].arrival_rate_mbps)
        .collect();

    let m = edges.len();
    let n = columns.len();
    let mut coefficients = vec![vec![0.0; n]; m];
    for (i, &(u, v)) in edges.iter().enumerate() {
        for (j, col) in columns.iter().enumerate() {
            if path_uses_edge(&col.path, u, v) {
                coefficients[i][j] = col.b_prime;
            }
        }
    }

    let (primal, dual_values) = bounded_simplex(&objective, &coefficients, &capacities);
    let duals = edges.into_iter().zip(dual_values).collect();
    RmpSolution { primal, duals }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bound {
    AtLower,
    AtUpper,
    Basic,
}

/// Maximize `c . x` subject to `a . x <= b`, `0 <= x_j <= 1`, via the bounded
/// revised-tableau primal simplex with Bland's anti-cycling pivoting rule.
///
/// Returns `(x, duals)`, where `duals[i]` is the non-negative shadow price of
/// constraint `i` (the negated final reduced cost of that constraint's slack
/// variable).
fn bounded_simplex(c: &[f64], a: &[Vec<f64>], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    const EPS: f64 = 1e-9;

    let n = c.len();
    let m = b.len();
    let total = n + m;

    if m == 0 {
        // No constraints: every variable with positive reward saturates its bound.
        let x: Vec<f64> = c.iter().map(|&cj| if cj > 0.0 { 1.0 } else { 0.0 }).collect();
        return (x, Vec::new());
    }

    // Tableau holds [A | I], rhs holds b; both evolve under Gauss-Jordan pivots
    // exactly as in the unbounded simplex, independent of which nonbasic variables
    // currently sit at their upper bound.
    let mut tableau = vec![vec![0.0; total]; m];
    let mut rhs = b.to_vec();
    for i in 0..m {
        tableau[i][..n].copy_from_slice(&a[i]);
        tableau[i][n + i] = 1.0;
    }

    let mut upper = vec![1.0; total];
    for slot in upper.iter_mut().skip(n) {
        *slot = f64::INFINITY;
    }

    // Reduced costs, d_j = c_j - z_j. Initially z_j = 0 since every basic variable
    // (the slacks) has zero objective coefficient.
    let mut reduced = vec![0.0; total];
    reduced[..n].copy_from_slice(c);

    let mut status = vec![Bound::AtLower; total];
    let mut basis = vec![0usize; m];
    for (i, slot) in basis.iter_mut().enumerate() {
        *slot = n + i;
        status[n + i] = Bound::Basic;
    }

    let max_iterations = 200 * total.max(1);
    for _ in 0..max_iterations {
        let entering = status.iter().enumerate().find_map(|(j, &st)| match st {
            Bound::AtLower if reduced[j] > EPS => Some((j, 1.0)),
            Bound::AtUpper if reduced[j] < -EPS => Some((j, -1.0)),
            _ => None,
        });
        let (enter, direction) = match entering {
            Some(e) => e,
            None => break,
        };

        let mut limit = upper[enter];
        let mut leaving: Option<(usize, Bound)> = None;

        for i in 0..m {
            let coeff = tableau[i][enter] * direction;
            if coeff > EPS {
                let value = basic_value(i, &tableau, &rhs, &status, &upper);
                let candidate = value / coeff;
                if candidate < limit - 1e-12 {
                    limit = candidate;
                    leaving = Some((i, Bound::AtLower));
                }
            } else if coeff < -EPS {
                let cap = upper[basis[i]];
                if cap.is_finite() {
                    let value = basic_value(i, &tableau, &rhs, &status, &upper);
                    let candidate = (cap - value) / (-coeff);
                    if candidate < limit - 1e-12 {
                        limit = candidate;
                        leaving = Some((i, Bound::AtUpper));
                    }
                }
            }
        }

        if !limit.is_finite() {
            break;
        }

        match leaving {
            None => {
                status[enter] = if direction > 0.0 { Bound::AtUpper } else { Bound::AtLower };
            }
            Some((row, vacated_bound)) => {
                let pivot = tableau[row][enter];
                for value in tableau[row].iter_mut() {
                    *value /= pivot;
                }
                rhs[row] /= pivot;
                for i in 0..m {
                    if i == row {
                        continue;
                    }
                    let factor = tableau[i][enter];
                    if factor != 0.0 {
                        let pivot_row = tableau[row].clone();
                        for (value, pivot_value) in tableau[i].iter_mut().zip(pivot_row.iter()) {
                            *value -= factor * pivot_value;
                        }
                        rhs[i] -= factor * rhs[row];
                    }
                }
                let factor = reduced[enter];
                if factor != 0.0 {
                    for (value, pivot_value) in reduced.iter_mut().zip(tableau[row].iter()) {
                        *value -= factor * pivot_value;
                    }
                }
                let vacated = basis[row];
                status[vacated] = vacated_bound;
                status[enter] = Bound::Basic;
                basis[row] = enter;
            }
        }
    }

    let mut x = vec![0.0; total];
    for (j, slot) in x.iter_mut().enumerate() {
        *slot = match status[j] {
            Bound::AtLower => 0.0,
            Bound::AtUpper => upper[j],
            Bound::Basic => 0.0,
        };
    }
    for i in 0..m {
        x[basis[i]] = basic_value(i, &tableau, &rhs, &status, &upper);
    }

    let primal: Vec<f64> = x[..n].iter().map(|v| v.clamp(0.0, 1.0)).collect();
    let duals: Vec<f64> = (0..m).map(|i| (-reduced[n + i]).max(0.0)).collect();
    (primal, duals)
}

/// Current value of the basic variable in row `i`: `rhs[i]` minus the contribution
/// of every nonbasic variable currently pinned at its upper bound.
fn basic_value(i: usize, tableau: &[Vec<f64>], rhs: &[f64], status: &[Bound], upper: &[f64]) -> f64 {
    let mut value = rhs[i];
    for (j, &st) in status.iter().enumerate() {
        if st == Bound::AtUpper {
            value -= tableau[i][j] * upper[j];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeId;

    fn column(flow: u32, path: &[u32], b_prime: f64) -> Column {
        Column {
            flow: FlowId(flow),
            path: path.iter().map(|&n| NodeId(n)).collect(),
            b_prime,
        }
    }

    #[test]
    fn empty_columns_yield_empty_primal_and_zero_duals() {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 10.0);
        let flows = HashMap::new();
        let sol = solve_rmp(&[], &net, &flows, 1000.0);
        assert!(sol.primal.is_empty());
        assert_eq!(sol.duals[&(NodeId(1), NodeId(2))], 0.0);
    }

    #[test]
    fn single_column_within_capacity_is_fully_admitted() {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 1000.0);
        let mut flows = HashMap::new();
        flows.insert(
            FlowId(1),
            Flow {
                id: FlowId(1),
                arrival_rate_mbps: 5.0,
                burst_size_kb: 1.0,
                max_e2e_delay_ms: 10.0,
                max_pkt_size_kb: 1.0,
                src: NodeId(1),
                dest: NodeId(2),
            },
        );
        let columns = vec![column(1, &[1, 2], 1.0)];
        let sol = solve_rmp(&columns, &net, &flows, 1000.0);
        assert!((sol.primal[0] - 1.0).abs() < 1e-6);
        assert_eq!(sol.duals[&(NodeId(1), NodeId(2))], 0.0);
    }

    #[test]
    fn competing_columns_share_a_saturated_edge() {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 1.0);
        let mut flows = HashMap::new();
        flows.insert(
            FlowId(1),
            Flow {
                id: FlowId(1),
                arrival_rate_mbps: 10.0,
                burst_size_kb: 1.0,
                max_e2e_delay_ms: 10.0,
                max_pkt_size_kb: 1.0,
                src: NodeId(1),
                dest: NodeId(2),
            },
        );
        flows.insert(
            FlowId(2),
            Flow {
                id: FlowId(2),
                arrival_rate_mbps: 1.0,
                burst_size_kb: 1.0,
                max_e2e_delay_ms: 10.0,
                max_pkt_size_kb: 1.0,
                src: NodeId(1),
                dest: NodeId(2),
            },
        );
        // Capacity is 1.0 * 1000 = 1000 (KB per cycle); each column alone demands
        // 800, so both cannot be fully admitted together.
        let columns = vec![column(1, &[1, 2], 800.0), column(2, &[1, 2], 800.0)];
        let sol = solve_rmp(&columns, &net, &flows, 1000.0);
        let used = sol.primal[0] * 800.0 + sol.primal[1] * 800.0;
        assert!(used <= 1000.0 + 1e-6);
        // The edge is saturated, so its dual should be strictly positive.
        assert!(sol.duals[&(NodeId(1), NodeId(2))] > 0.0);
    }

    #[test]
    fn disjoint_columns_do_not_interact() {
        let mut net = Network::new();
        net.add_link(NodeId(1), NodeId(2), 1.0, 1000.0);
        net.add_link(NodeId(3), NodeId(4), 1.0, 1000.0);
        let mut flows = HashMap::new();
        flows.insert(
            FlowId(1),
            Flow {
                id: FlowId(1),
                arrival_rate_mbps: 5.0,
                burst_size_kb: 1.0,
                max_e2e_delay_ms: 10.0,
                max_pkt_size_kb: 1.0,
                src: NodeId(1),
                dest: NodeId(2),
            },
        );
        flows.insert(
            FlowId(2),
            Flow {
                id: FlowId(2),
                arrival_rate_mbps: 5.0,
                burst_size_kb: 1.0,
                max_e2e_delay_ms: 10.0,
                max_pkt_size_kb: 1.0,
                src: NodeId(3),
                dest: NodeId(4),
            },
        );
        let columns = vec![column(1, &[1, 2], 1.0), column(2, &[3, 4], 1.0)];
        let sol = solve_rmp(&columns, &net, &flows, 1000.0);
        assert!((sol.primal[0] - 1.0).abs() < 1e-6);
        assert!((sol.primal[1] - 1.0).abs() < 1e-6);
    }
}
