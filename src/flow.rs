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

//! Flows, packets, and the feasible-shaping-parameter enumeration.

use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::network::NodeId;

/// Identifier of a flow, as given in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowId(pub u32);

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The CQF cycle label a packet is scheduled into. Always reduced modulo 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u8);

impl Label {
    /// Build a label from any integer, reducing it modulo 3.
    pub fn new(value: i64) -> Self {
        Label(value.rem_euclid(3) as u8)
    }

    /// The underlying value, always in `0..3`.
    pub fn value(self) -> u8 {
        self.0
    }

    /// This label shifted forward by `cycles`, wrapping modulo 3.
    pub fn shifted(self, cycles: i64) -> Self {
        Label::new(self.0 as i64 + cycles)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single packet belonging to a flow.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Size of the packet, in KB.
    pub size_kb: f64,
    /// The flow this packet belongs to.
    pub flow_id: FlowId,
    /// Cycle label, assigned at shaping time and rewritten on every forwarding hop.
    pub label: Label,
}

/// An immutable flow admission request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique flow identifier.
    pub id: FlowId,
    /// Arrival rate, in Mbps.
    pub arrival_rate_mbps: f64,
    /// Maximum burst size, in KB.
    pub burst_size_kb: f64,
    /// Maximum tolerable end-to-end delay, in ms.
    pub max_e2e_delay_ms: f64,
    /// Maximum packet size, in KB.
    pub max_pkt_size_kb: f64,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dest: NodeId,
}

impl Flow {
    /// Generate the flow's packet sequence: greedily split the burst into
    /// `max_pkt_size_kb`-sized chunks, with the remainder as the final, smaller
    /// packet. Labels are left at 0 here; shaping assigns the real labels.
    pub fn generate_packets(&self) -> Vec<Packet> {
        let mut packets = Vec::new();
        let mut remaining = self.burst_size_kb;
        while remaining > 0.0 {
            let size = self.max_pkt_size_kb.min(remaining);
            packets.push(Packet {
                size_kb: size,
                flow_id: self.id,
                label: Label::new(0),
            });
            remaining -= size;
        }
        packets
    }
}

/// Enumerate every feasible burst-shaping value b′ (KB per cycle) for `flow` given a
/// cycle duration `cycle_duration_us` (µs), sorted ascending.
///
/// For `n = 1, 2, 3, ...`, let `c = ceil(burst_size / n)`. While `c` stays at or above
/// `arrival_rate · T` (the packet still fits the cycle) and keeps strictly
/// decreasing, each `n` contributes a candidate `max_pkt_size * ceil(burst_size / (n
/// * max_pkt_size))`, rounding up to a whole number of packets.
pub fn enumerate_shaping(flow: &Flow, cycle_duration_us: f64) -> Vec<f64> {
    let mps = flow.max_pkt_size_kb;
    let bf = flow.burst_size_kb;
    // Mbps -> KB/us.
    let rf = flow.arrival_rate_mbps * 0.000_125;

    let mut values = BTreeSet::new();
    let mut prev_ceil = f64::INFINITY;
    let mut n: u64 = 1;
    loop {
        let c = (bf / n as f64).ceil();
        if c < rf * cycle_duration_us {
            break;
        }
        let candidate = mps * (bf / (n as f64 * mps)).ceil();
        values.insert(OrderedFloat(candidate));
        if c >= prev_ceil {
            break;
        }
        prev_ceil = c;
        n += 1;
    }
    values.into_iter().map(|v| v.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> Flow {
        Flow {
            id: FlowId(1),
            arrival_rate_mbps: 10.0,
            burst_size_kb: 4.0,
            max_e2e_delay_ms: 30.0,
            max_pkt_size_kb: 1.0,
            src: NodeId(1),
            dest: NodeId(2),
        }
    }

    #[test]
    fn shaping_values_are_sorted_and_deterministic() {
        let f = flow();
        let a = enumerate_shaping(&f, 1000.0);
        let b = enumerate_shaping(&f, 1000.0);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(a, sorted);
        assert!(!a.is_empty());
    }

    #[test]
    fn shaping_values_are_multiples_of_packet_size() {
        let f = flow();
        for b in enumerate_shaping(&f, 1000.0) {
            let ratio = b / f.max_pkt_size_kb;
            assert!((ratio - ratio.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn extreme_rate_yields_no_feasible_shaping() {
        let mut f = flow();
        f.arrival_rate_mbps = 1e9;
        assert!(enumerate_shaping(&f, 1000.0).is_empty());
    }

    #[test]
    fn generate_packets_preserves_total_burst_within_rounding() {
        let f = flow();
        let packets = f.generate_packets();
        let total: f64 = packets.iter().map(|p| p.size_kb).sum();
        assert!((total - f.burst_size_kb).abs() < 1e-9);
        assert!(packets.iter().all(|p| p.size_kb <= f.max_pkt_size_kb + 1e-9));
    }

    #[test]
    fn label_wraps_modulo_three() {
        assert_eq!(Label::new(5).value(), 2);
        assert_eq!(Label::new(-1).value(), 2);
        assert_eq!(Label::new(0).shifted(3).value(), 0);
    }
}
