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

//! The per-node runtime: one thread per node, draining its inbound channel and
//! ticking its cycle clock, with a process-wide completion wait.
//!
//! Packets never cross directly from one node's lock into another's: a node's
//! `transmit_packets()` call returns the packets it wants to send, and this module
//! forwards each one onto the destination's inbound `mpsc::Sender`, released from
//! the sending node's lock first. This is the fix for the reentrancy hazard a naive
//! "call the neighbor directly" design would have.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::flow::{FlowId, Packet};
use crate::forwarding::Node;
use crate::network::NodeId;

/// How often a node thread wakes up to check its cycle clock and drain its inbound
/// channel, matching spec's coarse wall-clock polling model.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything a single node's thread needs: its shared state, its inbound channel,
/// and the senders of every other node it can forward to.
struct NodeRunner {
    node: Arc<Mutex<Node>>,
    inbound: mpsc::Receiver<(Packet, NodeId)>,
    outbound: HashMap<NodeId, mpsc::Sender<(Packet, NodeId)>>,
    cycle_duration: Duration,
    kill: Arc<AtomicBool>,
    flow_done: mpsc::Sender<FlowId>,
}

impl NodeRunner {
    fn run(self) {
        let mut last_tick = Instant::now();
        loop {
            if self.kill.load(Ordering::Relaxed) {
                return;
            }

            while let Ok((packet, in_port)) = self.inbound.try_recv() {
                self.node.lock().unwrap().receive_packet(packet, in_port);
            }

            if last_tick.elapsed() >= self.cycle_duration {
                let (id, result) = {
                    let mut node = self.node.lock().unwrap();
                    (node.id, node.transmit_packets())
                };
                for (next_hop, packet) in result.forwarded {
                    match self.outbound.get(&next_hop) {
                        Some(tx) => {
                            let _ = tx.send((packet, id));
                        }
                        None => warn!("node {id}: no route to {next_hop}, dropping packet"),
                    }
                }
                if let Some(flow) = result.completed_flow {
                    let _ = self.flow_done.send(flow);
                }
                last_tick = Instant::now();
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// A running simulation: one thread per node, join handles, and the shared kill
/// switch used to stop them once the completion wait (or a timeout) ends.
pub struct Simulation {
    handles: Vec<thread::JoinHandle<()>>,
    kill: Arc<AtomicBool>,
    flow_done_rx: mpsc::Receiver<FlowId>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("handles", &self.handles.len())
            .field("kill", &self.kill)
            .field("flow_done_rx", &"mpsc::Receiver<FlowId>")
            .finish()
    }
}

impl Simulation {
    /// Spawn one thread per node in `nodes`, wiring inbound/outbound channels from
    /// `network.edges()` so every pair of neighbors can reach each other.
    pub fn spawn(
        nodes: HashMap<NodeId, Node>,
        edges: &[(NodeId, NodeId)],
        cycle_duration_us: f64,
    ) -> Simulation {
        let cycle_duration = Duration::from_micros(cycle_duration_us.max(0.0) as u64);
        let kill = Arc::new(AtomicBool::new(false));
        let (flow_done_tx, flow_done_rx) = mpsc::channel();

        let mut senders: HashMap<NodeId, mpsc::Sender<(Packet, NodeId)>> = HashMap::new();
        let mut receivers: HashMap<NodeId, mpsc::Receiver<(Packet, NodeId)>> = HashMap::new();
        for &id in nodes.keys() {
            let (tx, rx) = mpsc::channel();
            senders.insert(id, tx);
            receivers.insert(id, rx);
        }

        let mut neighbor_ids: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &(a, b) in edges {
            neighbor_ids.entry(a).or_default().push(b);
            neighbor_ids.entry(b).or_default().push(a);
        }

        let mut handles = Vec::with_capacity(nodes.len());
        for (id, node) in nodes {
            let inbound = receivers.remove(&id).expect("inbound channel registered for every node");
            let outbound: HashMap<NodeId, mpsc::Sender<(Packet, NodeId)>> = neighbor_ids
                .get(&id)
                .into_iter()
                .flatten()
                .filter_map(|n| senders.get(n).map(|tx| (*n, tx.clone())))
                .collect();

            let runner = NodeRunner {
                node: Arc::new(Mutex::new(node)),
                inbound,
                outbound,
                cycle_duration,
                kill: Arc::clone(&kill),
                flow_done: flow_done_tx.clone(),
            };
            handles.push(thread::spawn(move || runner.run()));
        }

        info!("simulation running: {} node thread(s)", handles.len());
        Simulation { handles, kill, flow_done_rx }
    }

    /// Wait for every flow in `pending` to complete, up to `timeout`. On full
    /// success returns `Ok(())`; on timeout returns the flows still incomplete.
    pub fn wait_for_completion(&self, pending: &[FlowId], timeout: Duration) -> Result<(), Vec<FlowId>> {
        let mut remaining: std::collections::HashSet<FlowId> = pending.iter().copied().collect();
        let deadline = Instant::now() + timeout;

        while !remaining.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.flow_done_rx.recv_timeout(deadline - now) {
                Ok(flow) => {
                    remaining.remove(&flow);
                }
                Err(mpsc::RecvTimeoutError::Timeout) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        if remaining.is_empty() {
            Ok(())
        } else {
            Err(remaining.into_iter().collect())
        }
    }

    /// Signal every node thread to stop, then join them all.
    pub fn shutdown(self) {
        self.kill.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}
