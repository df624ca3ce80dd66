//! Assembles a multi-plugin CNI conflist from a creation request, allocating
//! whatever the request left unspecified.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use ipnetwork::IpNetwork;
use netconf_types::conflist::{BridgePlugin, DnsnamePlugin, FirewallPlugin, Ipam, NetConfList, Plugin, PortmapPlugin};
use netconf_types::constants::{CURRENT_VERSION, ISULAD_DNS_DOMAIN_NAME};

use crate::error::AdaptorError;

const PLUGIN_ORDER: [&str; 4] = ["bridge", "portmap", "firewall", "dnsname"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    Bridge,
    Macvlan,
}

impl Default for Driver {
    fn default() -> Self {
        Driver::Bridge
    }
}

#[derive(Default)]
pub struct CreateRequest {
    pub name: Option<String>,
    pub driver: Option<Driver>,
    pub subnet: Option<IpNetwork>,
    pub gateway: Option<IpAddr>,
    pub internal: bool,
}

/// Everything the builder needs to know about the world outside the
/// request: what already exists, so allocation and collision checks can run.
pub struct BuildContext<'a> {
    pub existing_names: &'a [String],
    pub existing_cidrs: &'a [String],
    pub existing_bridge_names: &'a [String],
    pub host_interface_names: &'a [String],
    pub host_ips: &'a [IpAddr],
    pub bin_paths: &'a [PathBuf],
}

pub struct BuildOutcome {
    pub conflist: NetConfList,
    pub missing: Vec<String>,
}

pub fn build_conflist(
    request: &CreateRequest,
    ctx: &BuildContext,
) -> Result<BuildOutcome, AdaptorError> {
    let driver = request.driver.unwrap_or_default();
    if driver != Driver::Bridge {
        return Err(AdaptorError::Unsupported(
            "only the bridge driver is supported for create".to_string(),
        ));
    }

    if let Some(name) = &request.name {
        if ctx.existing_names.iter().any(|n| n == name) {
            return Err(AdaptorError::invalid_argument(format!(
                "Network name {:?} has been used",
                name
            )));
        }
    }

    let subnet = match &request.subnet {
        Some(user_subnet) => {
            let reduced = netconf_ipnet::reduce(user_subnet);
            if netconf_alloc::conflict::check_subnet_available(
                &reduced,
                ctx.existing_cidrs.iter(),
                ctx.host_ips.iter().copied(),
            ) == netconf_alloc::Availability::Conflicts
            {
                return Err(AdaptorError::invalid_argument(format!(
                    "subnet {} conflicts with an existing network",
                    reduced
                )));
            }
            reduced
        }
        None => netconf_alloc::allocate::allocate_subnet(ctx.existing_cidrs, ctx.host_ips)?,
    };

    let gateway = match request.gateway {
        Some(g) => g,
        None => netconf_alloc::allocate::derive_gateway(&subnet)?,
    };

    let bridge_name = netconf_alloc::allocate::allocate_bridge_name(|candidate| {
        ctx.existing_names.iter().any(|n| n == candidate)
            || ctx.existing_bridge_names.iter().any(|n| n == candidate)
            || ctx.host_interface_names.iter().any(|n| n == candidate)
    })?;

    let name = request.name.clone().unwrap_or_else(|| bridge_name.clone());

    let bridge_plugin = BridgePlugin {
        bridge: bridge_name,
        is_gateway: !request.internal,
        ip_masq: !request.internal,
        hairpin_mode: true,
        ipam: Ipam::host_local(subnet, gateway),
    };

    let mut plugins = Vec::with_capacity(PLUGIN_ORDER.len());
    let mut missing = Vec::new();

    for plugin_name in PLUGIN_ORDER {
        let exists = netconf_alloc::plugin_probe::plugin_exists(plugin_name, ctx.bin_paths);
        if !exists {
            missing.push(plugin_name.to_string());
            if plugin_name == "dnsname" {
                continue;
            }
        }
        let plugin = match plugin_name {
            "bridge" => Plugin::Bridge(bridge_plugin.clone()),
            "portmap" => Plugin::Portmap(PortmapPlugin {
                capabilities: HashMap::from([("portMappings".to_string(), true)]),
            }),
            "firewall" => Plugin::Firewall(FirewallPlugin {}),
            "dnsname" => Plugin::Dnsname(DnsnamePlugin {
                domain_name: ISULAD_DNS_DOMAIN_NAME.to_string(),
                capabilities: HashMap::from([("aliases".to_string(), true)]),
            }),
            _ => unreachable!("PLUGIN_ORDER is exhaustive"),
        };
        plugins.push(plugin);
    }

    Ok(BuildOutcome {
        conflist: NetConfList {
            cni_version: CURRENT_VERSION.to_string(),
            name,
            plugins,
        },
        missing,
    })
}

/// `WARN:cannot find cni plugin "X,Y" in dir "P1,P2"`, or `None` if nothing
/// other than `dnsname` is missing (a missing `dnsname` is silent, per §4.6).
pub fn missing_plugin_warning(missing: &[String], bin_paths: &[PathBuf]) -> Option<String> {
    let relevant: Vec<&str> = missing
        .iter()
        .map(String::as_str)
        .filter(|p| *p != "dnsname")
        .collect();
    if relevant.is_empty() {
        return None;
    }
    let plugins_csv = relevant.join(",");
    let dirs_csv = bin_paths
        .iter()
        .map(|p: &PathBuf| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",");
    Some(format!(
        "WARN:cannot find cni plugin \"{}\" in dir \"{}\"",
        plugins_csv, dirs_csv
    ))
}
