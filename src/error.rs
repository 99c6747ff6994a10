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

//! Crate-wide error types.

use thiserror::Error;

use crate::flow::FlowId;
use crate::network::NodeId;

/// Error loading or parsing the JSON configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file '{0}' not found")]
    NotFound(String),
    /// The configuration file is not valid JSON.
    #[error("configuration file '{0}' contains invalid JSON: {1}")]
    InvalidJson(String, serde_json::Error),
    /// A required field is missing from the configuration.
    #[error("missing required field in configuration: {0}")]
    MissingField(String),
    /// A link refers to a node that is not declared in `network.nodes`.
    #[error("link references unknown node {0:?}")]
    UnknownNode(NodeId),
}

/// Error returned by the pricing subproblem for a single flow. Not fatal: the flow
/// simply yields no column in this column-generation round.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum AdmissionError {
    /// Source and destination are not connected in the network graph.
    #[error("no path exists between {src:?} and {dest:?}")]
    NoPath {
        /// Flow source.
        src: NodeId,
        /// Flow destination.
        dest: NodeId,
    },
    /// Even the delay-optimal path exceeds the delay budget.
    #[error("delay-optimal path for flow {flow:?} exceeds its delay budget")]
    Infeasible {
        /// The flow that could not be routed within budget.
        flow: FlowId,
    },
}

/// Error surfaced by the forwarding simulation. Recorded in the results, not a hard
/// failure.
#[derive(Debug, Error)]
pub enum SimError {
    /// Not every admitted flow drained within the wait window.
    #[error("{0} flow(s) did not complete within the timeout")]
    CompletionTimeout(usize),
}

/// Top-level crate error, surfaced by `main`.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Filesystem error while reading the config or writing results.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Error serializing the results.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
