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

//! The JSON configuration file: network topology, per-node queuing-delay overrides,
//! and the flow list.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::flow::{Flow, FlowId};
use crate::network::{Network, NodeId};

/// A single link entry as it appears in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// First endpoint.
    pub node1: NodeId,
    /// Second endpoint.
    pub node2: NodeId,
    /// Propagation delay, in milliseconds.
    pub delay: f64,
    /// Link bandwidth.
    pub bandwidth: f64,
}

/// The `network` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Every node id in the topology.
    pub nodes: Vec<NodeId>,
    /// Every link in the topology.
    pub links: Vec<LinkConfig>,
    /// Per-node queuing delay overrides, keyed by node id. A node absent from this
    /// map uses its computed τ instead.
    #[serde(default, deserialize_with = "deserialize_queuing_delays")]
    pub queuing_delays: HashMap<NodeId, f64>,
}

/// JSON object keys are always strings; `network.queuing_delays` is keyed by node id
/// in the config file (`{"2": 0.1}`), so parse each key as a `u32` by hand rather
/// than relying on `NodeId`'s derived (numeric) `Deserialize`.
fn deserialize_queuing_delays<'de, D>(deserializer: D) -> Result<HashMap<NodeId, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let raw: HashMap<String, f64> = HashMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(k, v)| {
            k.parse::<u32>()
                .map(|id| (NodeId(id), v))
                .map_err(|_| D::Error::custom(format!("invalid node id '{k}' in queuing_delays")))
        })
        .collect()
}

/// The `simulation_parameters` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Cycle duration T, in microseconds.
    #[serde(rename = "cycle_duration_T")]
    pub cycle_duration_t: f64,
}

/// A single flow entry as it appears in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Unique flow identifier.
    pub flow_id: FlowId,
    /// Arrival rate, in Mbps.
    pub arrival_rate: f64,
    /// Maximum burst size, in KB.
    pub burst_size: f64,
    /// Maximum tolerable end-to-end delay, in ms.
    pub max_e2e_delay: f64,
    /// Maximum packet size, in KB.
    pub max_pkt_size: f64,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dest: NodeId,
}

impl From<FlowConfig> for Flow {
    fn from(c: FlowConfig) -> Self {
        Flow {
            id: c.flow_id,
            arrival_rate_mbps: c.arrival_rate,
            burst_size_kb: c.burst_size,
            max_e2e_delay_ms: c.max_e2e_delay,
            max_pkt_size_kb: c.max_pkt_size,
            src: c.src,
            dest: c.dest,
        }
    }
}

impl From<&Flow> for FlowConfig {
    fn from(f: &Flow) -> Self {
        FlowConfig {
            flow_id: f.id,
            arrival_rate: f.arrival_rate_mbps,
            burst_size: f.burst_size_kb,
            max_e2e_delay: f.max_e2e_delay_ms,
            max_pkt_size: f.max_pkt_size_kb,
            src: f.src,
            dest: f.dest,
        }
    }
}

/// The full configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `simulation_parameters` section.
    pub simulation_parameters: SimulationParameters,
    /// `network` section.
    pub network: NetworkConfig,
    /// `flows` section. Ignored when flows are generated with `--random`.
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
}

impl Config {
    /// Load and parse the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::InvalidJson(path.display().to_string(), e))
    }

    /// Build the [`Network`] described by this configuration's `network` section,
    /// rejecting links that reference a node outside `network.nodes`.
    pub fn build_network(&self) -> Result<Network, ConfigError> {
        let mut net = Network::new();
        for &id in &self.network.nodes {
            net.add_node(id);
        }
        for link in &self.network.links {
            if !net.contains_node(link.node1) {
                return Err(ConfigError::UnknownNode(link.node1));
            }
            if !net.contains_node(link.node2) {
                return Err(ConfigError::UnknownNode(link.node2));
            }
            net.add_link(link.node1, link.node2, link.delay, link.bandwidth);
        }
        Ok(net)
    }

    /// The flows declared in the `flows` section, converted to [`Flow`].
    pub fn flows(&self) -> Vec<Flow> {
        self.flows.iter().cloned().map(Flow::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
      "simulation_parameters": { "cycle_duration_T": 1000 },
      "network": {
        "nodes": [1, 2, 3],
        "links": [
          { "node1": 1, "node2": 2, "delay": 0.5, "bandwidth": 100 },
          { "node1": 2, "node2": 3, "delay": 0.5, "bandwidth": 100 }
        ],
        "queuing_delays": { "2": 0.1 }
      },
      "flows": [
        { "flow_id": 1, "arrival_rate": 10, "burst_size": 4, "max_e2e_delay": 30, "max_pkt_size": 1, "src": 1, "dest": 3 }
      ]
    }
    "#;

    #[test]
    fn parses_a_complete_config() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.network.nodes.len(), 3);
        assert_eq!(config.flows.len(), 1);
        assert_eq!(config.network.queuing_delays[&NodeId(2)], 0.1);
    }

    #[test]
    fn build_network_rejects_unknown_node_in_a_link() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.network.links.push(LinkConfig {
            node1: NodeId(3),
            node2: NodeId(99),
            delay: 1.0,
            bandwidth: 10.0,
        });
        let err = config.build_network().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNode(NodeId(99))));
    }

    #[test]
    fn load_reports_not_found_for_a_missing_path() {
        let err = Config::load(Path::new("/nonexistent/does-not-exist.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn flow_config_round_trips_into_flow() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let flows = config.flows();
        assert_eq!(flows[0].id, FlowId(1));
        assert_eq!(flows[0].src, NodeId(1));
        assert_eq!(flows[0].dest, NodeId(3));
    }
}
