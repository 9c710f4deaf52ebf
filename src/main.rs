// Probesim: Static firewall probe simulator written in Rust
// Copyright (C) 2023 The Probesim Authors
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

use clap::Parser;
use ipnet::IpNet;
use log::*;

use probesim::{
    prelude::*,
    probe::{parse_protocol, Protocol},
    report::Report,
};

/// Inject a probe into a network described in JSON and report the verdict.
#[derive(Debug, Parser)]
struct Cli {
    /// JSON description of the network
    #[clap(long = "network", short = 'n')]
    network: String,
    /// Inject the probe on this equipment instead of the network of the source
    #[clap(long = "equipment", short = 'e')]
    equipment: Option<String>,
    /// Initial time to live
    #[clap(long)]
    ttl: Option<u8>,
    /// Maximum number of forwarded probes
    #[clap(long)]
    max_hops: Option<usize>,
    /// Stop probes as soon as they are certainly denied
    #[clap(long)]
    quick_deny: bool,
    /// Protocols, by number or name (e.g. `6` or `tcp`), any protocol if omitted
    #[clap(long = "proto", short = 'p', value_parser = parse_protocol)]
    protocols: Vec<Protocol>,
    /// Destination port or port range (e.g. `80` or `1024-2048`)
    #[clap(long)]
    port: Option<PortSpec>,
    /// TCP flags as letters (e.g. `S` or `SA`)
    #[clap(long)]
    flags: Option<TcpFlags>,
    /// Print the routing table of every equipment
    #[clap(long)]
    routes: bool,
    /// Show every matching rule and the per-probe results
    #[clap(short, long)]
    verbose: bool,
    /// Source address or network
    source: IpNet,
    /// Destination address or network
    destination: IpNet,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    let config = NetworkConfig::from_file(&args.network)?;
    let net = config.build()?;
    info!("Loaded network from {}", args.network);

    let mut options = config.options.clone();
    if let Some(ttl) = args.ttl {
        options.time_to_live = ttl;
    }
    if args.max_hops.is_some() {
        options.max_hops = args.max_hops;
    }
    options.quick_deny |= args.quick_deny;

    if args.routes {
        for id in net.get_equipments() {
            if let Some(e) = net.get_equipment(id) {
                println!("{}\n{}", e.name(), e.routing_table().fmt(&net));
            }
        }
    }

    let mut request = ProbeRequest::any();
    if !args.protocols.is_empty() {
        request = request.protocols(args.protocols.iter().copied());
    }
    if let Some(port) = args.port {
        request = request.dest_port(port);
    }
    if let Some(flags) = args.flags {
        request = request.tcp_flags(flags);
    }
    request.options.quick_deny = args.quick_deny;

    let sim = Simulator::new(&net, &options);
    let probing = match args.equipment.as_deref() {
        Some(equipment) => sim.probe_from(equipment, args.source, args.destination, request)?,
        None => sim.probe(args.source, args.destination, request)?,
    };

    print!("{}", Report::new(&net, args.verbose).show_probing(&probing));

    Ok(())
}
