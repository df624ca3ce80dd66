//! On-disk JSON shape of a CNI configuration list, bit-exact with the upstream
//! CNI spec: `cniVersion`, `name`, `plugins[]`.

use std::collections::HashMap;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub dst: IpNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<IpAddr>,
}

impl Route {
    pub fn default_v4() -> Self {
        Route {
            dst: "0.0.0.0/0".parse().expect("static CIDR parses"),
            gw: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IpamRange {
    pub subnet: IpNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ipam {
    #[serde(rename = "type")]
    pub plugin: String,
    pub routes: Vec<Route>,
    pub ranges: Vec<Vec<IpamRange>>,
}

impl Ipam {
    /// A host-local IPAM block with a single range carrying exactly one entry,
    /// as built by the conflist builder (§4.5/§4.6).
    pub fn host_local(subnet: IpNetwork, gateway: IpAddr) -> Self {
        Ipam {
            plugin: "host-local".to_string(),
            routes: vec![Route::default_v4()],
            ranges: vec![vec![IpamRange {
                subnet,
                gateway: Some(gateway),
            }]],
        }
    }

    pub fn subnet(&self) -> Option<IpNetwork> {
        self.ranges.first()?.first().map(|r| r.subnet)
    }

    pub fn gateway(&self) -> Option<IpAddr> {
        self.ranges.first()?.first().and_then(|r| r.gateway)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePlugin {
    pub bridge: String,
    pub is_gateway: bool,
    pub ip_masq: bool,
    pub hairpin_mode: bool,
    pub ipam: Ipam,
}

impl BridgePlugin {
    pub fn subnet(&self) -> Option<IpNetwork> {
        self.ipam.subnet()
    }

    pub fn gateway(&self) -> Option<IpAddr> {
        self.ipam.gateway()
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PortmapPlugin {
    pub capabilities: HashMap<String, bool>,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct FirewallPlugin {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsnamePlugin {
    pub domain_name: String,
    pub capabilities: HashMap<String, bool>,
}

/// A plugin type this crate does not model explicitly. Preserved verbatim so
/// conflists produced by other tooling still round-trip through the store.
#[derive(Clone, Debug, PartialEq)]
pub struct OtherPlugin {
    pub plugin_type: String,
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Plugin {
    Bridge(BridgePlugin),
    Portmap(PortmapPlugin),
    Firewall(FirewallPlugin),
    Dnsname(DnsnamePlugin),
    Other(OtherPlugin),
}

impl Plugin {
    pub fn plugin_type(&self) -> &str {
        match self {
            Plugin::Bridge(_) => "bridge",
            Plugin::Portmap(_) => "portmap",
            Plugin::Firewall(_) => "firewall",
            Plugin::Dnsname(_) => "dnsname",
            Plugin::Other(p) => &p.plugin_type,
        }
    }

    pub fn as_bridge(&self) -> Option<&BridgePlugin> {
        match self {
            Plugin::Bridge(b) => Some(b),
            _ => None,
        }
    }
}

impl Serialize for Plugin {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut value = match self {
            Plugin::Bridge(p) => serde_json::to_value(p),
            Plugin::Portmap(p) => serde_json::to_value(p),
            Plugin::Firewall(p) => serde_json::to_value(p),
            Plugin::Dnsname(p) => serde_json::to_value(p),
            Plugin::Other(p) => Ok(Value::Object(p.fields.clone())),
        }
        .map_err(serde::ser::Error::custom)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "type".to_string(),
                Value::String(self.plugin_type().to_string()),
            );
        }
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Plugin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let plugin_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DeError::custom("plugin is missing \"type\""))?
            .to_string();

        let plugin = match plugin_type.as_str() {
            "bridge" => Plugin::Bridge(serde_json::from_value(value).map_err(DeError::custom)?),
            "portmap" => Plugin::Portmap(serde_json::from_value(value).map_err(DeError::custom)?),
            "firewall" => {
                Plugin::Firewall(serde_json::from_value(value).map_err(DeError::custom)?)
            }
            "dnsname" => Plugin::Dnsname(serde_json::from_value(value).map_err(DeError::custom)?),
            _ => match value {
                Value::Object(fields) => Plugin::Other(OtherPlugin {
                    plugin_type,
                    fields,
                }),
                _ => return Err(DeError::custom("plugin must be a JSON object")),
            },
        };
        Ok(plugin)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetConfList {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub name: String,
    pub plugins: Vec<Plugin>,
}

impl NetConfList {
    pub fn bridge_plugin(&self) -> Option<&BridgePlugin> {
        self.plugins.iter().find_map(Plugin::as_bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NetConfList {
        NetConfList {
            cni_version: "1.0.0".to_string(),
            name: "net1".to_string(),
            plugins: vec![
                Plugin::Bridge(BridgePlugin {
                    bridge: "isula-br0".to_string(),
                    is_gateway: true,
                    ip_masq: true,
                    hairpin_mode: true,
                    ipam: Ipam::host_local(
                        "192.168.0.0/24".parse().unwrap(),
                        "192.168.0.1".parse().unwrap(),
                    ),
                }),
                Plugin::Portmap(PortmapPlugin {
                    capabilities: HashMap::from([("portMappings".to_string(), true)]),
                }),
                Plugin::Firewall(FirewallPlugin {}),
                Plugin::Dnsname(DnsnamePlugin {
                    domain_name: "isulad.net".to_string(),
                    capabilities: HashMap::from([("aliases".to_string(), true)]),
                }),
            ],
        }
    }

    #[test]
    fn round_trips_through_json() {
        let original = sample();
        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded: NetConfList = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn serializes_bit_exact_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["cniVersion"], "1.0.0");
        assert_eq!(value["plugins"][0]["type"], "bridge");
        assert_eq!(value["plugins"][0]["isGateway"], true);
        assert_eq!(value["plugins"][0]["ipam"]["type"], "host-local");
        assert_eq!(value["plugins"][0]["ipam"]["routes"][0]["dst"], "0.0.0.0/0");
        assert_eq!(value["plugins"][1]["type"], "portmap");
        assert_eq!(value["plugins"][1]["capabilities"]["portMappings"], true);
        assert_eq!(value["plugins"][2]["type"], "firewall");
        assert_eq!(value["plugins"][3]["type"], "dnsname");
        assert_eq!(value["plugins"][3]["domainName"], "isulad.net");
    }

    #[test]
    fn unknown_plugin_type_round_trips_as_other() {
        let raw = serde_json::json!({"type": "tuning", "sysctl": {"net.ipv4.ip_forward": "1"}});
        let plugin: Plugin = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(plugin.plugin_type(), "tuning");
        let back = serde_json::to_value(&plugin).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn bridge_plugin_lookup() {
        let list = sample();
        let bridge = list.bridge_plugin().unwrap();
        assert_eq!(bridge.bridge, "isula-br0");
        assert_eq!(bridge.subnet().unwrap().to_string(), "192.168.0.0/24");
    }
}
