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

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! Admission control and Cyclic Queuing and Forwarding (CQF) simulation for
//! Time-Sensitive Networking (TSN) topologies.
//!
//! Given a network topology and a set of flows, this crate:
//!
//! - decides which flows to admit via column generation over a restricted master
//!   LP ([`admission`]), pricing new columns with a LARAC constrained-shortest-path
//!   subproblem ([`admission::larac`]) and rounding the fractional solution to an
//!   integer decision ([`admission::rounding`]);
//! - wires the admitted flows' paths and burst-shaping parameters onto a
//!   per-node CQF state machine ([`forwarding`]), deriving each node's label
//!   remapping table from its neighbors' propagation delays
//!   ([`forwarding::mapping`]);
//! - runs the result as a thread-per-node simulation ([`sim`]) and reports the
//!   outcome as JSON ([`report`]).

pub mod admission;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod forwarding;
pub mod network;
pub mod random_flows;
pub mod report;
pub mod sim;

pub use error::Error;
pub use flow::{Flow, FlowId};
pub use network::{Network, NodeId};
