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

//! Assembly and serialization of `simulation_results.json`.

use std::collections::HashMap;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::admission::AdmissionPlan;
use crate::config::{NetworkConfig, SimulationParameters};
use crate::error::Error;
use crate::flow::{Flow, FlowId};
use crate::network::NodeId;

/// One flow's entry in the results file.
#[derive(Debug, Serialize)]
pub struct FlowResult {
    flow_id: FlowId,
    arrival_rate: f64,
    burst_size: f64,
    max_e2e_delay: f64,
    max_pkt_size: f64,
    src: NodeId,
    dest: NodeId,
    admitted: bool,
    path: Vec<NodeId>,
    shaping_parameter: Option<f64>,
}

/// The full `simulation_results.json` document.
#[derive(Debug, Serialize)]
pub struct Results {
    simulation_parameters: SimulationParameters,
    network: NetworkConfig,
    flows: Vec<FlowResult>,
    admitted_flows_count: usize,
    total_flows_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_status: Option<HashMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_reached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    incomplete_flows: Option<Vec<FlowId>>,
}

impl Results {
    /// Assemble the results document from the flows considered, the admission
    /// decision, and the config's network section (carried through unchanged).
    pub fn new(
        simulation_parameters: SimulationParameters,
        network: NetworkConfig,
        flows: &[Flow],
        plan: &AdmissionPlan,
    ) -> Results {
        let admitted_flows_count = flows.iter().filter(|f| plan.is_admitted(f.id)).count();
        let flow_results = flows
            .iter()
            .map(|f| {
                let (path, shaping_parameter) = plan
                    .admitted
                    .get(&f.id)
                    .map(|(p, b)| (p.clone(), Some(*b)))
                    .unwrap_or_default();
                FlowResult {
                    flow_id: f.id,
                    arrival_rate: f.arrival_rate_mbps,
                    burst_size: f.burst_size_kb,
                    max_e2e_delay: f.max_e2e_delay_ms,
                    max_pkt_size: f.max_pkt_size_kb,
                    src: f.src,
                    dest: f.dest,
                    admitted: plan.is_admitted(f.id),
                    path,
                    shaping_parameter,
                }
            })
            .collect();

        Results {
            simulation_parameters,
            network,
            flows: flow_results,
            admitted_flows_count,
            total_flows_count: flows.len(),
            simulation_complete: None,
            completion_status: None,
            timeout_reached: None,
            incomplete_flows: None,
        }
    }

    /// Record that every admitted flow completed within the wait window.
    pub fn mark_complete(&mut self, completed: &[FlowId]) {
        self.simulation_complete = Some(true);
        self.completion_status = Some(completed.iter().map(|f| (f.0.to_string(), true)).collect());
    }

    /// Record that the wait window elapsed with some flows still incomplete.
    pub fn mark_timeout(&mut self, incomplete: Vec<FlowId>) {
        self.simulation_complete = Some(false);
        self.timeout_reached = Some(true);
        self.incomplete_flows = Some(incomplete);
    }

    /// Write the document as pretty-printed JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Log a human-readable table of every flow under consideration, at `info` level.
pub fn log_flow_table(flows: &[Flow]) {
    info!("{:-<100}", "");
    info!(
        "{:<5} | {:<11} | {:<10} | {:<15} | {:<13} | {:<6} | {:<5}",
        "ID", "Rate (Mbps)", "Burst (KB)", "Max Delay (ms)", "Pkt Size (KB)", "Source", "Dest"
    );
    info!("{:-<100}", "");
    for flow in flows {
        info!(
            "{:<5} | {:<11.2} | {:<10.2} | {:<15.2} | {:<13.2} | {:<6} | {:<5}",
            flow.id, flow.arrival_rate_mbps, flow.burst_size_kb, flow.max_e2e_delay_ms, flow.max_pkt_size_kb, flow.src, flow.dest
        );
    }
    info!("{:-<100}", "");
}
