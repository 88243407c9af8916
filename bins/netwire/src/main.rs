//! netwire command - inspect the virtual network topology of a host.

mod output;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use netwire::portfwd::whereis::where_is;
use netwire::{Discovery, DiscoveryConfig, NamespaceId, ProcInventory, Topology};

#[derive(Parser)]
#[command(name = "netwire", version, about = "Virtual network topology discovery")]
struct Cli {
    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Verbose logging.
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// procfs mount point.
    #[arg(long, default_value = "/proc", global = true)]
    proc: PathBuf,

    /// sysfs mount point.
    #[arg(long, default_value = "/sys", global = true)]
    sys: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List network namespaces.
    #[command(visible_alias = "ns")]
    Namespaces,

    /// Show interfaces and their relations.
    #[command(visible_alias = "nif")]
    Interfaces {
        /// Only this namespace (inode number).
        netns: Option<u64>,
    },

    /// Show open sockets and their processes.
    Ports {
        /// Only this namespace (inode number).
        netns: Option<u64>,
    },

    /// Show forwarded ports and where they end up.
    #[command(visible_alias = "fwd")]
    Forwards,

    /// Find where traffic to an address is delivered.
    Whereis {
        /// Namespace the traffic originates in (inode number).
        netns: u64,
        ip: IpAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = DiscoveryConfig::default()
        .proc_root(&cli.proc)
        .sysfs_root(&cli.sys)
        .sockets(matches!(cli.command, Command::Ports { .. } | Command::Forwards))
        .forwarded_ports(matches!(cli.command, Command::Forwards));
    let inventory = ProcInventory::new().proc_root(&cli.proc);

    let topo = tokio::task::spawn_blocking(move || Discovery::new(config, inventory).run())
        .await
        .context("discovery worker failed")??;

    match cli.command {
        Command::Namespaces => {
            if cli.json {
                output::print_json(&topo.namespaces, cli.pretty)?;
            } else {
                output::print_namespaces(&topo);
            }
        }
        Command::Interfaces { netns } => {
            let topo = filtered(topo, netns)?;
            if cli.json {
                output::print_json(&topo, cli.pretty)?;
            } else {
                output::print_interfaces(&topo);
            }
        }
        Command::Ports { netns } => {
            let topo = filtered(topo, netns)?;
            if cli.json {
                let sockets: Vec<_> = topo
                    .namespaces
                    .values()
                    .flat_map(|ns| ns.sockets_v4.iter().chain(ns.sockets_v6.iter()))
                    .collect();
                output::print_json(&sockets, cli.pretty)?;
            } else {
                output::print_ports(&topo);
            }
        }
        Command::Forwards => {
            if cli.json {
                let ports: Vec<_> = topo.namespaces.values().flat_map(|ns| ns.forwarded_ports()).collect();
                output::print_json(&ports, cli.pretty)?;
            } else {
                output::print_forwards(&topo);
            }
        }
        Command::Whereis { netns, ip } => {
            let from = NamespaceId(netns);
            anyhow::ensure!(topo.netns(from).is_some(), "unknown namespace {from}");
            let hit = where_is(&topo, from, &ip);
            if cli.json {
                let found = hit.map(|(ns, nif)| {
                    serde_json::json!({
                        "netns": ns,
                        "nif": nif,
                        "name": topo.nif(&nif).map(|n| n.name.as_str()),
                    })
                });
                output::print_json(&found, cli.pretty)?;
            } else {
                match hit.and_then(|(ns, nif)| topo.nif(&nif).map(|n| (ns, n))) {
                    Some((ns, nif)) => println!("{ip} is at {} in {ns}", nif.name),
                    None => println!("{ip} not found"),
                }
            }
        }
    }

    Ok(())
}

/// Keep only one namespace when requested.
fn filtered(mut topo: Topology, netns: Option<u64>) -> anyhow::Result<Topology> {
    if let Some(id) = netns.map(NamespaceId) {
        anyhow::ensure!(topo.netns(id).is_some(), "unknown namespace {id}");
        topo.namespaces.retain(|k, _| *k == id);
    }
    Ok(topo)
}
