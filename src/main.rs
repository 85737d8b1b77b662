// EgpSim: inter-domain routing fabric simulator written in Rust
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

//! CLI entry point (`spec.md` §6 "Command-line interface").

use clap::Parser;
use egpsim::config;
use egpsim::simulator::Simulator;
use log::error;

/// Run a policy-based inter-domain routing simulation from a JSON
/// configuration file.
#[derive(Debug, Parser)]
#[command(name = "egpsim", version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short = 'c', long = "config_file")]
    config_file: String,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Enable info-level logging (quieter than `--verbose`).
    #[arg(short = 'i', long)]
    info: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        "debug"
    } else if args.info {
        "info"
    } else {
        "warn"
    };
    std::env::set_var("RUST_LOG", std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()));
    pretty_env_logger::init();

    let cfg = match config::load(&args.config_file) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut sim = Simulator::from_config(cfg);
    sim.set_verbose(args.verbose);

    if let Err(e) = sim.run() {
        error!("simulation aborted: {}", e);
        std::process::exit(1);
    }
}
