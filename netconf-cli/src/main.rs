//! Operator CLI over the network adaptor library. Unlike the CNI plugin
//! binaries in this workspace (which speak the `CNI_COMMAND` env-var
//! protocol on stdin/stdout), this is a conventional subcommand CLI: the
//! gRPC/CRI front door that would normally drive `netconf::NativeStore` is
//! out of scope for this adaptor, so this binary stands in for it when
//! poking at a config directory by hand.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ipnetwork::IpNetwork;

use netconf::{ApiConf, CreateRequest, Driver, ListFilter, NativeStore};

#[derive(Parser)]
#[command(name = "netconf")]
#[command(about = "Create, attach, and inspect isula-style bridge networks", long_about = None)]
struct Cli {
    /// Directory holding `<prefix>*.conflist` files.
    #[arg(long, global = true, default_value = "/etc/cni/net.d")]
    conf_dir: PathBuf,

    /// CNI plugin binary search path; repeatable, searched in order.
    #[arg(long = "bin-path", global = true, default_value = "/opt/cni/bin")]
    bin_paths: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new bridge network.
    Create {
        name: Option<String>,
        #[arg(long)]
        subnet: Option<IpNetwork>,
        #[arg(long)]
        gateway: Option<IpAddr>,
        #[arg(long)]
        internal: bool,
        /// Reserved for parity with the driver table; only "bridge" works.
        #[arg(long, default_value = "bridge")]
        driver: String,
    },
    /// Remove a network. Fails if any container is still attached.
    Remove { name: String },
    /// List known networks, optionally filtered.
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        driver: Option<String>,
        #[arg(long)]
        plugin_type: Option<String>,
    },
    /// Print the full conflist JSON for one network.
    Inspect { name: String },
    /// Attach a sandbox's network namespace to one or more networks.
    Attach {
        pod_id: String,
        netns_path: String,
        /// `network:interface`, repeatable; order matters (first carries annotations).
        #[arg(long = "net", required = true)]
        nets: Vec<String>,
        #[arg(long = "arg", value_parser = parse_kv)]
        args: Vec<(String, String)>,
    },
    /// Detach a sandbox from one or more networks (best-effort on missing networks).
    Detach {
        pod_id: String,
        netns_path: String,
        #[arg(long = "net", required = true)]
        nets: Vec<String>,
        #[arg(long = "arg", value_parser = parse_kv)]
        args: Vec<(String, String)>,
    },
}

fn parse_kv(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn parse_extra(raw: &str) -> Result<(String, String)> {
    raw.split_once(':')
        .map(|(net, ifname)| (net.to_string(), ifname.to_string()))
        .with_context(|| format!("expected network:interface, got {raw:?}"))
}

fn main() -> Result<()> {
    let _ = netconf_types::logger::init("netconf-cli.log");

    let cli = Cli::parse();
    let store = NativeStore::init(cli.conf_dir, cli.bin_paths)?;

    match cli.command {
        Command::Create {
            name,
            subnet,
            gateway,
            internal,
            driver,
        } => {
            let driver = match driver.as_str() {
                "bridge" => Some(Driver::Bridge),
                "macvlan" => Some(Driver::Macvlan),
                other => bail!("unknown driver {other:?}"),
            };
            let response = store.create(CreateRequest {
                name,
                driver,
                subnet,
                gateway,
                internal,
            })?;
            println!("created network {:?}", response.name);
            if let Some(warning) = response.warning {
                eprintln!("{warning}");
            }
        }
        Command::Remove { name } => {
            let response = store.remove(&name)?;
            println!("removed network {name:?}");
            for warning in response.warnings {
                eprintln!("WARN: {warning}");
            }
        }
        Command::List {
            name,
            driver,
            plugin_type,
        } => {
            let summaries = store.list(&ListFilter {
                name,
                driver,
                plugin_type,
            });
            for summary in summaries {
                println!(
                    "{}\t{}\t{}\t{}\tcontainers={}",
                    summary.name,
                    summary.driver,
                    summary.subnet.as_deref().unwrap_or("-"),
                    summary
                        .gateway
                        .map(|g| g.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    summary.container_count
                );
            }
        }
        Command::Inspect { name } => {
            let value = store.inspect(&name)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Attach {
            pod_id,
            netns_path,
            nets,
            args,
        } => {
            let extras = nets.iter().map(|s| parse_extra(s)).collect::<Result<Vec<_>>>()?;
            let results = store.attach(ApiConf {
                pod_id,
                netns_path,
                args: args.into_iter().collect::<HashMap<_, _>>(),
                annotations: None,
                extras,
            })?;
            println!("{}", serde_json::to_string_pretty(&summarize(&results))?);
        }
        Command::Detach {
            pod_id,
            netns_path,
            nets,
            args,
        } => {
            let extras = nets.iter().map(|s| parse_extra(s)).collect::<Result<Vec<_>>>()?;
            store.detach(ApiConf {
                pod_id,
                netns_path,
                args: args.into_iter().collect::<HashMap<_, _>>(),
                annotations: None,
                extras,
            })?;
            println!("detached");
        }
    }

    Ok(())
}

fn summarize(results: &[netconf::ApiResult]) -> serde_json::Value {
    serde_json::json!(results
        .iter()
        .map(|r| serde_json::json!({
            "network": r.network_name,
            "interface": r.interface,
            "result": r.result,
        }))
        .collect::<Vec<_>>())
}
