//! The in-memory network registry: a name -> record map guarded by a single
//! reader-writer lock, plus the attach/detach orchestrator built on top of
//! it. See the module-level lock discipline note on `NativeStore`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, RwLock};

use log::{info, warn};
use netconf_invoke::{CniInvoker, CniManager, ProcessCniInvoker};
use netconf_store::record::NetworkRecord;
use netconf_types::constants::{
    CONFIG_DIRECTORY_MODE, CONFIG_FILE_MODE, MAX_NETWORK_CONFIG_FILE_COUNT, NATIVE_CONFIG_PREFIX,
    NATIVE_CONFIG_SUFFIX, NETWORK_DRIVER_BRIDGE,
};
use netconf_types::error::is_not_found_error;

use crate::builder::{build_conflist, missing_plugin_warning, BuildContext, CreateRequest};
use crate::error::AdaptorError;
use crate::types::{ApiConf, ApiResult, CreateResponse, ListFilter, NetworkSummary, RemoveResponse};

/// A process-wide network registry handle. Construct with `init`; tests
/// construct independent instances pointed at a temp directory rather than
/// relying on a global singleton.
pub struct NativeStore {
    conf_dir: PathBuf,
    bin_paths: Vec<PathBuf>,
    invoker: Box<dyn CniInvoker + Send + Sync>,
    networks: RwLock<HashMap<String, Arc<NetworkRecord>>>,
}

impl NativeStore {
    pub fn init(conf_dir: impl Into<PathBuf>, bin_paths: Vec<PathBuf>) -> Result<Arc<Self>, AdaptorError> {
        Self::init_with_invoker(
            conf_dir,
            bin_paths.clone(),
            Box::new(ProcessCniInvoker::new(bin_paths)),
        )
    }

    pub fn init_with_invoker(
        conf_dir: impl Into<PathBuf>,
        bin_paths: Vec<PathBuf>,
        invoker: Box<dyn CniInvoker + Send + Sync>,
    ) -> Result<Arc<Self>, AdaptorError> {
        let conf_dir = conf_dir.into();
        let loaded = netconf_store::disk::load_all(&conf_dir, NATIVE_CONFIG_PREFIX, MAX_NETWORK_CONFIG_FILE_COUNT)?;

        let mut networks = HashMap::new();
        let mut loaded_cidrs: Vec<(String, ipnetwork::IpNetwork)> = Vec::new();
        for item in loaded {
            if let Some(bridge) = item.conflist.bridge_plugin() {
                if let Some(subnet) = bridge.subnet() {
                    for (other_name, other_subnet) in &loaded_cidrs {
                        if netconf_ipnet::overlap(&subnet, other_subnet) {
                            warn!(
                                "loaded network {:?} overlaps already-loaded network {:?}; keeping both (§9 open question: log-only)",
                                item.conflist.name, other_name
                            );
                        }
                    }
                    loaded_cidrs.push((item.conflist.name.clone(), subnet));
                }
            }
            let name = item.conflist.name.clone();
            networks.insert(name, Arc::new(NetworkRecord::new(item.conflist, item.raw_json)));
        }

        info!("loaded {} network(s) from {:?}", networks.len(), conf_dir);
        Ok(Arc::new(Self {
            conf_dir,
            bin_paths,
            invoker,
            networks: RwLock::new(networks),
        }))
    }

    pub fn create(&self, request: CreateRequest) -> Result<CreateResponse, AdaptorError> {
        let mut networks = self.networks.write().expect("store lock poisoned");

        let existing_names: Vec<String> = networks.keys().cloned().collect();
        let existing_cidrs: Vec<String> = networks
            .values()
            .filter_map(|r| r.conflist.bridge_plugin())
            .filter_map(|b| b.subnet())
            .map(|s| s.to_string())
            .collect();
        let existing_bridge_names: Vec<String> = networks
            .values()
            .filter_map(|r| r.conflist.bridge_plugin())
            .map(|b| b.bridge.clone())
            .collect();
        let host_interface_names: Vec<String> =
            netconf_alloc::host::interface_names()
                .map_err(|e| AdaptorError::IoError {
                    message: format!("failed to enumerate host interfaces: {e}"),
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                })?
                .into_iter()
                .collect();
        let host_ips: Vec<std::net::IpAddr> = netconf_alloc::host::host_addresses()
            .map_err(|e| AdaptorError::IoError {
                message: format!("failed to enumerate host addresses: {e}"),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?
            .into_iter()
            .collect();

        let ctx = BuildContext {
            existing_names: &existing_names,
            existing_cidrs: &existing_cidrs,
            existing_bridge_names: &existing_bridge_names,
            host_interface_names: &host_interface_names,
            host_ips: &host_ips,
            bin_paths: &self.bin_paths,
        };

        let outcome = build_conflist(&request, &ctx)?;
        let warning = missing_plugin_warning(&outcome.missing, &self.bin_paths);

        let raw_json = netconf_store::disk::write_conflist(
            &self.conf_dir,
            NATIVE_CONFIG_PREFIX,
            NATIVE_CONFIG_SUFFIX,
            CONFIG_DIRECTORY_MODE,
            CONFIG_FILE_MODE,
            &outcome.conflist,
        )?;

        let name = outcome.conflist.name.clone();
        info!("created network {:?}", name);
        networks.insert(
            name.clone(),
            Arc::new(NetworkRecord::new(outcome.conflist, raw_json)),
        );

        Ok(CreateResponse { name, warning })
    }

    pub fn remove(&self, name: &str) -> Result<RemoveResponse, AdaptorError> {
        let mut networks = self.networks.write().expect("store lock poisoned");

        let record = networks
            .get(name)
            .ok_or_else(|| AdaptorError::not_found(format!("No such network {:?}", name)))?
            .clone();

        if record.is_in_use() {
            return Err(AdaptorError::InUse(format!(
                "network {:?} has connected containers",
                name
            )));
        }

        let mut warnings = Vec::new();

        if let Some(bridge) = record.conflist.bridge_plugin() {
            match netconf_alloc::host::interface_names() {
                Ok(names) if names.contains(&bridge.bridge) => {
                    if let Err(e) = delete_bridge_interface(&bridge.bridge) {
                        warn!("failed to delete bridge interface {:?}: {}", bridge.bridge, e);
                        warnings.push(format!("failed to delete bridge {:?}: {}", bridge.bridge, e));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("failed to enumerate host interfaces during remove: {}", e);
                    warnings.push(format!("failed to enumerate host interfaces: {e}"));
                }
            }
        }

        if let Err(e) =
            netconf_store::disk::remove_conflist(&self.conf_dir, NATIVE_CONFIG_PREFIX, NATIVE_CONFIG_SUFFIX, name)
        {
            let message = e.to_string();
            // The file is already gone (removed out-of-band, or never made
            // it to disk), which is the outcome we wanted anyway.
            if !is_not_found_error(&anyhow::Error::new(e)) {
                warn!("failed to delete conflist file for {:?}: {}", name, message);
                warnings.push(format!("failed to delete config file: {message}"));
            }
        }

        networks.remove(name);
        info!("removed network {:?}", name);

        Ok(RemoveResponse { warnings })
    }

    pub fn attach(&self, conf: ApiConf) -> Result<Vec<ApiResult>, AdaptorError> {
        let networks = self.networks.read().expect("store lock poisoned");

        self.invoker
            .attach_loopback(&conf.pod_id, &conf.netns_path)
            .map_err(|e| AdaptorError::plugin_error("failed to attach loopback", e))?;

        let mut results = Vec::with_capacity(conf.extras.len());
        for (i, (network_name, interface)) in conf.extras.iter().enumerate() {
            let record = networks
                .get(network_name)
                .ok_or_else(|| AdaptorError::not_found(format!("No such network {:?}", network_name)))?;

            let manager = CniManager {
                id: conf.pod_id.clone(),
                netns_path: conf.netns_path.clone(),
                cni_args: conf.args.clone(),
                ifname: interface.clone(),
                annotations: if i == 0 { conf.annotations.clone() } else { None },
            };

            let result = self
                .invoker
                .add(&manager, &record.conflist)
                .map_err(|e| AdaptorError::plugin_error(format!("failed to attach to {:?}", network_name), e))?;

            record.add_container(conf.pod_id.clone());
            results.push(ApiResult {
                network_name: network_name.clone(),
                interface: interface.clone(),
                result,
            });
        }

        Ok(results)
    }

    pub fn detach(&self, conf: ApiConf) -> Result<(), AdaptorError> {
        let networks = self.networks.read().expect("store lock poisoned");

        self.invoker
            .detach_loopback(&conf.pod_id, &conf.netns_path)
            .map_err(|e| AdaptorError::plugin_error("failed to detach loopback", e))?;

        for (network_name, interface) in &conf.extras {
            let Some(record) = networks.get(network_name) else {
                warn!("detach: network {:?} does not exist, skipping", network_name);
                continue;
            };

            let manager = CniManager {
                id: conf.pod_id.clone(),
                netns_path: conf.netns_path.clone(),
                cni_args: conf.args.clone(),
                ifname: interface.clone(),
                annotations: None,
            };

            if let Err(e) = self.invoker.del(&manager, &record.conflist) {
                warn!("detach: cni delete failed for {:?}: {}", network_name, e);
            }

            record.remove_container(&conf.pod_id);
        }

        Ok(())
    }

    pub fn list(&self, filter: &ListFilter) -> Vec<NetworkSummary> {
        let networks = self.networks.read().expect("store lock poisoned");
        networks
            .values()
            .filter(|r| filter.name.as_deref().map_or(true, |n| r.name() == n))
            .filter(|r| {
                filter
                    .driver
                    .as_deref()
                    .map_or(true, |d| d == NETWORK_DRIVER_BRIDGE && r.conflist.bridge_plugin().is_some())
            })
            .filter(|r| {
                filter
                    .plugin_type
                    .as_deref()
                    .map_or(true, |t| r.conflist.plugins.iter().any(|p| p.plugin_type() == t))
            })
            .map(|r| NetworkSummary {
                name: r.name().to_string(),
                driver: NETWORK_DRIVER_BRIDGE.to_string(),
                subnet: r
                    .conflist
                    .bridge_plugin()
                    .and_then(|b| b.subnet())
                    .map(|s| s.to_string()),
                gateway: r.conflist.bridge_plugin().and_then(|b| b.gateway()),
                container_count: r.container_count(),
            })
            .collect()
    }

    pub fn inspect(&self, name: &str) -> Result<serde_json::Value, AdaptorError> {
        let networks = self.networks.read().expect("store lock poisoned");
        let record = networks
            .get(name)
            .ok_or_else(|| AdaptorError::not_found(format!("No such network {:?}", name)))?;
        serde_json::to_value(&record.conflist)
            .map_err(|e| AdaptorError::Internal(format!("failed to serialize conflist: {e}")))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.networks.read().expect("store lock poisoned").contains_key(name)
    }
}

fn delete_bridge_interface(bridge: &str) -> anyhow::Result<()> {
    let status = Command::new("ip").args(["link", "delete", bridge]).status()?;
    if !status.success() {
        anyhow::bail!("ip link delete {} exited with {}", bridge, status);
    }
    Ok(())
}
