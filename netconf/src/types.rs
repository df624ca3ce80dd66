//! Public request/response shapes for attach/detach and list/inspect, kept
//! separate from the on-disk conflist model in `netconf-types`.

use std::collections::HashMap;
use std::net::IpAddr;

use netconf_types::exec::CniResult;

/// One (network, interface) pair a sandbox wants attached or detached.
pub type Extra = (String, String);

pub struct ApiConf {
    pub pod_id: String,
    pub netns_path: String,
    pub args: HashMap<String, String>,
    pub annotations: Option<HashMap<String, String>>,
    pub extras: Vec<Extra>,
}

/// A single network's CNI result, tagged with which (network, interface)
/// request produced it.
pub struct ApiResult {
    pub network_name: String,
    pub interface: String,
    pub result: CniResult,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub name: Option<String>,
    pub driver: Option<String>,
    pub plugin_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkSummary {
    pub name: String,
    pub driver: String,
    pub subnet: Option<String>,
    pub gateway: Option<IpAddr>,
    pub container_count: usize,
}

pub struct RemoveResponse {
    pub warnings: Vec<String>,
}

pub struct CreateResponse {
    pub name: String,
    pub warning: Option<String>,
}
