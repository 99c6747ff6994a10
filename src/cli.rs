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

//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Run admission control and CQF forwarding simulation over a TSN network.
#[derive(Debug, Parser)]
#[command(name = "cqf-sim", version)]
pub struct Cli {
    /// Path to the network configuration JSON file.
    #[arg(default_value = "network_config.json")]
    pub config: PathBuf,
    /// Generate this many random flows instead of reading `flows` from the config.
    #[arg(long)]
    pub random: Option<usize>,
    /// Path to write the simulation results JSON.
    #[arg(long, default_value = "simulation_results.json")]
    pub output: PathBuf,
    /// How long to wait, in seconds, for all admitted flows to complete.
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
    /// Increase logging verbosity (can be repeated).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Decrease logging verbosity (can be repeated).
    #[arg(short = 'q', long = "quiet", action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// The `RUST_LOG`-style level filter implied by `-v`/`-q`, relative to the
    /// default `info`.
    pub fn log_level(&self) -> log::LevelFilter {
        use log::LevelFilter::*;
        let levels = [Error, Warn, Info, Debug, Trace];
        let base = 2i32; // Info
        let idx = (base + self.verbose as i32 - self.quiet as i32).clamp(0, levels.len() as i32 - 1);
        levels[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_cli_surface() {
        let cli = Cli::parse_from(["cqf-sim"]);
        assert_eq!(cli.config, PathBuf::from("network_config.json"));
        assert_eq!(cli.output, PathBuf::from("simulation_results.json"));
        assert_eq!(cli.timeout, 60);
        assert_eq!(cli.random, None);
    }

    #[test]
    fn random_flag_parses_a_count() {
        let cli = Cli::parse_from(["cqf-sim", "--random", "5"]);
        assert_eq!(cli.random, Some(5));
    }

    #[test]
    fn verbosity_shifts_the_level_filter() {
        let quiet = Cli::parse_from(["cqf-sim", "-q"]);
        assert_eq!(quiet.log_level(), log::LevelFilter::Warn);
        let verbose = Cli::parse_from(["cqf-sim", "-vv"]);
        assert_eq!(verbose.log_level(), log::LevelFilter::Trace);
    }
}
