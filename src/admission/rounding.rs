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

//! Randomized rounding of the restricted master problem's fractional solution into
//! an integer, capacity-respecting admission decision.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::network::Network;

use super::{path_uses_edge, Column};

const Z_EPS: f64 = 1e-6;

/// Round the fractional `primal` solution into an integer admission decision.
///
/// Columns with `z_k >= 1` always make the base solution. Columns with
/// `0 < z_k < 1` are sampled, with replacement, weighted by their own `z_k`, once
/// per fractional column per round (mirroring the fixed-distribution re-draw of the
/// source algorithm, since the weights never change within a round); a sampled
/// column joins the solution if doing so does not exceed any edge's capacity given
/// what is already selected. The best-scoring (highest admitted arrival rate) of
/// `max_rounds` attempts is kept, always compared against the base-only solution.
///
/// `rates[k]` must be the objective coefficient (arrival rate) of `columns[k]`.
/// Returns the indices, into `columns`, of the selected set.
pub fn randomized_round(
    columns: &[Column],
    rates: &[f64],
    primal: &[f64],
    network: &Network,
    cycle_duration_us: f64,
    max_rounds: usize,
    rng: &mut impl Rng,
) -> Vec<usize> {
    let base: Vec<usize> = (0..columns.len()).filter(|&k| primal[k] >= 1.0 - Z_EPS).collect();
    let fractional: Vec<usize> = (0..columns.len())
        .filter(|&k| primal[k] > Z_EPS && primal[k] < 1.0 - Z_EPS)
        .collect();

    let score = |set: &[usize]| -> f64 { set.iter().map(|&k| rates[k]).sum() };

    let mut best = base.clone();
    let mut best_score = score(&best);

    if fractional.is_empty() {
        return best;
    }

    let weights: Vec<f64> = fractional.iter().map(|&k| primal[k]).collect();
    let distribution = match WeightedIndex::new(&weights) {
        Ok(d) => d,
        Err(_) => return best,
    };

    for _ in 0..max_rounds {
        let mut current = base.clone();
        for _ in 0..fractional.len() {
            let pick = fractional[distribution.sample(rng)];
            if !current.contains(&pick) && fits(&current, pick, columns, network, cycle_duration_us) {
                current.push(pick);
            }
        }
        let current_score = score(&current);
        if current_score > best_score {
            best_score = current_score;
            best = current;
        }
    }

    best
}

/// Whether adding `candidate` to `current` keeps every edge it touches within
/// capacity.
fn fits(
    current: &[usize],
    candidate: usize,
    columns: &[Column],
    network: &Network,
    cycle_duration_us: f64,
) -> bool {
    let col = &columns[candidate];
    col.path.windows(2).all(|hop| {
        let (u, v) = (hop[0], hop[1]);
        let capacity = network.bandwidth(u, v) * cycle_duration_us;
        let used: f64 = current
            .iter()
            .map(|&k| &columns[k])
            .filter(|c| path_uses_edge(&c.path, u, v))
            .map(|c| c.b_prime)
            .sum();
        used + col.b_prime <= capacity + 1e-9
    })
}
