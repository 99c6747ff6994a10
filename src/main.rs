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

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use log::info;

use cqf_sim::admission;
use cqf_sim::cli::Cli;
use cqf_sim::config::Config;
use cqf_sim::error::{Error, SimError};
use cqf_sim::flow::{Flow, FlowId};
use cqf_sim::forwarding::Node;
use cqf_sim::network::NodeId;
use cqf_sim::random_flows::generate_random_flows;
use cqf_sim::report::{log_flow_table, Results};
use cqf_sim::sim::Simulation;

/// Column-generation iterations allowed before giving up on further improvement.
const MAX_CG_ITERATIONS: usize = 100;
/// Randomized-rounding attempts per admission run.
const MAX_ROUNDING_ROUNDS: usize = 100;

fn main() {
    let cli = Cli::parse();
    pretty_env_logger::formatted_timed_builder()
        .filter_level(cli.log_level())
        .init();

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::load(&cli.config)?;
    let network = config.build_network()?;

    let flows = match cli.random {
        Some(count) => {
            let mut rng = rand::thread_rng();
            let generated = generate_random_flows(count, &config.network.nodes, &mut rng);
            info!("generated {} random flow(s)", generated.len());
            generated
        }
        None => {
            let loaded = config.flows();
            info!("loaded {} flow(s) from {}", loaded.len(), cli.config.display());
            loaded
        }
    };
    log_flow_table(&flows);

    let cycle_duration_us = config.simulation_parameters.cycle_duration_t;
    let node_delays = network.effective_node_delays(cycle_duration_us, &config.network.queuing_delays);
    let mut rng = rand::thread_rng();
    let plan = admission::run(
        &network,
        &flows,
        cycle_duration_us,
        &node_delays,
        MAX_CG_ITERATIONS,
        MAX_ROUNDING_ROUNDS,
        &mut rng,
    );

    for flow in &flows {
        if let Some((path, b_prime)) = plan.admitted.get(&flow.id) {
            let hops: Vec<String> = path.iter().map(|n| n.to_string()).collect();
            info!("flow {} admitted, b'={} KB, path {}", flow.id, b_prime, hops.join(" -> "));
        } else {
            info!("flow {} not admitted", flow.id);
        }
    }

    let mut results = Results::new(config.simulation_parameters.clone(), config.network.clone(), &flows, &plan);
    results.write(&cli.output)?;

    if plan.admitted.is_empty() {
        info!("no flows were admitted, nothing to simulate");
        return Ok(());
    }

    let flows_by_id: HashMap<FlowId, &Flow> = flows.iter().map(|f| (f.id, f)).collect();
    let nodes = build_nodes(&config.network.nodes, &flows_by_id, &node_delays, &network, &plan, cycle_duration_us);
    let edges = network.edges();

    let sim = Simulation::spawn(nodes, &edges, cycle_duration_us);
    let pending: Vec<_> = plan.admitted.keys().copied().collect();
    let outcome = sim.wait_for_completion(&pending, Duration::from_secs(cli.timeout));
    sim.shutdown();

    match outcome {
        Ok(()) => {
            info!("all admitted flows completed");
            results.mark_complete(&pending);
        }
        Err(incomplete) => {
            let timeout = SimError::CompletionTimeout(incomplete.len());
            log::warn!("{timeout} (waited {}s)", cli.timeout);
            results.mark_timeout(incomplete);
        }
    }
    results.write(&cli.output)?;

    Ok(())
}

/// Build every node (ingress for each flow source, core otherwise), wire link
/// delays and learned mappings, and install the admitted flows' routing entries
/// and shaping.
fn build_nodes(
    node_ids: &[NodeId],
    flows_by_id: &HashMap<FlowId, &Flow>,
    queuing_delays: &HashMap<NodeId, f64>,
    network: &cqf_sim::network::Network,
    plan: &admission::AdmissionPlan,
    cycle_duration_us: f64,
) -> HashMap<NodeId, Node> {
    let sources: std::collections::HashSet<NodeId> =
        plan.admitted.values().map(|(path, _)| path[0]).collect();

    let mut nodes: HashMap<NodeId, Node> = node_ids
        .iter()
        .map(|&id| {
            let node = if sources.contains(&id) { Node::new_ingress(id) } else { Node::new_core(id) };
            (id, node)
        })
        .collect();

    for &id in node_ids {
        let node = nodes.get_mut(&id).unwrap();
        for neighbor in network.neighbors(id) {
            node.set_link_delay(neighbor, network.delay(id, neighbor));
        }
        if let Some(&delay) = queuing_delays.get(&id) {
            node.set_queuing_delay(delay);
        }
    }

    for (&flow_id, (path, b_prime)) in &plan.admitted {
        nodes.get_mut(&path[0]).unwrap().set_flow_path(flow_id, path.clone());
        if let Some(&flow) = flows_by_id.get(&flow_id) {
            nodes.get_mut(&path[0]).unwrap().shape_flow(flow, *b_prime);
        }
        for hop in path.windows(2) {
            nodes.get_mut(&hop[0]).unwrap().set_routing_entry(flow_id, hop[1]);
        }
    }

    for (a, b) in network.edges() {
        let neighbors_of_a = network.neighbors(a);
        let neighbors_of_b = network.neighbors(b);
        if let Some(node) = nodes.get_mut(&b) {
            cqf_sim::forwarding::learn_mappings(node, a, &neighbors_of_b, cycle_duration_us, None);
        }
        if let Some(node) = nodes.get_mut(&a) {
            cqf_sim::forwarding::learn_mappings(node, b, &neighbors_of_a, cycle_duration_us, None);
        }
    }

    nodes
}
