//! Abstraction over "run a CNI plugin binary", with a process-exec default
//! implementation. Everything the plugin binary does internally (veth
//! pairing, IPAM file locking, iptables masquerade rules, delegation to a
//! nested IPAM plugin) is the plugin's own business, not this crate's.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::info;
use netconf_types::conflist::NetConfList;
use netconf_types::constants::CURRENT_VERSION;
use netconf_types::exec::CniResult;

/// Per-attachment identity passed down to a CNI plugin invocation.
pub struct CniManager {
    pub id: String,
    pub netns_path: String,
    pub cni_args: HashMap<String, String>,
    pub ifname: String,
    pub annotations: Option<HashMap<String, String>>,
}

pub trait CniInvoker {
    /// Bring up the sandbox's loopback interface. Fatal on failure.
    fn attach_loopback(&self, pod_id: &str, netns_path: &str) -> anyhow::Result<()>;

    /// Tear down the sandbox's loopback interface. Fatal on failure.
    fn detach_loopback(&self, pod_id: &str, netns_path: &str) -> anyhow::Result<()>;

    /// Run the conflist's first plugin with `CNI_COMMAND=ADD`.
    fn add(&self, manager: &CniManager, conflist: &NetConfList) -> anyhow::Result<CniResult>;

    /// Run the conflist's first plugin with `CNI_COMMAND=DEL`.
    fn del(&self, manager: &CniManager, conflist: &NetConfList) -> anyhow::Result<()>;
}

struct CniArgs {
    command: String,
    container_id: String,
    netns: String,
    args: HashMap<String, String>,
    ifname: String,
    path: String,
}

fn stringify_args(args: &HashMap<String, String>) -> String {
    let mut result = String::new();
    for (key, value) in args {
        result.push_str(&format!("{}={};", key, value));
    }
    result
}

impl CniArgs {
    fn as_env(&self) -> HashMap<String, String> {
        let mut env = std::env::vars().collect::<HashMap<_, _>>();
        env.insert("CNI_COMMAND".to_string(), self.command.clone());
        env.insert("CNI_CONTAINERID".to_string(), self.container_id.clone());
        env.insert("CNI_NETNS".to_string(), self.netns.clone());
        env.insert("CNI_ARGS".to_string(), stringify_args(&self.args));
        env.insert("CNI_IFNAME".to_string(), self.ifname.clone());
        env.insert("CNI_PATH".to_string(), self.path.clone());
        env
    }
}

/// Execs the plugin binary found on `bin_paths`, the default, concrete
/// `CniInvoker` collaborator.
pub struct ProcessCniInvoker {
    bin_paths: Vec<PathBuf>,
}

impl ProcessCniInvoker {
    pub fn new(bin_paths: Vec<PathBuf>) -> Self {
        Self { bin_paths }
    }

    fn find_plugin_path(&self, plugin: &str) -> anyhow::Result<PathBuf> {
        self.bin_paths
            .iter()
            .map(|dir| dir.join(plugin))
            .find(|full_path| full_path.exists() && full_path.is_file())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "plugin {} not found in search paths {:?}",
                    plugin,
                    self.bin_paths
                )
            })
    }

    fn cni_path_env(&self) -> String {
        self.bin_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }

    fn exec_plugin(&self, plugin: &str, stdin_data: &[u8], args: &CniArgs) -> anyhow::Result<Vec<u8>> {
        let plugin_path = self.find_plugin_path(plugin)?;
        info!("exec {:?} command={}", plugin_path, args.command);

        let mut child = Command::new(plugin_path.as_os_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .envs(args.as_env())
            .spawn()?;
        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin.write_all(stdin_data)?;
        drop(stdin);
        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut buffer = Vec::new();
        stdout.read_to_end(&mut buffer)?;
        let exit_status = child.wait()?;

        if !exit_status.success() {
            anyhow::bail!(
                "plugin {} exited with {}: {}",
                plugin,
                exit_status,
                String::from_utf8_lossy(&buffer)
            );
        }
        Ok(buffer)
    }

    fn single_plugin_stdin(conflist: &NetConfList) -> anyhow::Result<(String, Vec<u8>)> {
        let plugin = conflist
            .plugins
            .first()
            .ok_or_else(|| anyhow::anyhow!("conflist {} has no plugins", conflist.name))?;
        let plugin_type = plugin.plugin_type().to_string();
        let mut value = serde_json::to_value(plugin)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "cniVersion".to_string(),
                serde_json::Value::String(conflist.cni_version.clone()),
            );
            map.insert(
                "name".to_string(),
                serde_json::Value::String(conflist.name.clone()),
            );
        }
        Ok((plugin_type, serde_json::to_vec(&value)?))
    }
}

impl ProcessCniInvoker {
    fn loopback(&self, command: &str, pod_id: &str, netns_path: &str) -> anyhow::Result<()> {
        let stdin = serde_json::to_vec(&serde_json::json!({
            "cniVersion": CURRENT_VERSION,
            "name": "cni-loopback",
            "type": "loopback",
        }))?;
        let args = CniArgs {
            command: command.to_string(),
            container_id: pod_id.to_string(),
            netns: netns_path.to_string(),
            args: HashMap::new(),
            ifname: "lo".to_string(),
            path: self.cni_path_env(),
        };
        self.exec_plugin("loopback", &stdin, &args)?;
        Ok(())
    }
}

impl CniInvoker for ProcessCniInvoker {
    fn attach_loopback(&self, pod_id: &str, netns_path: &str) -> anyhow::Result<()> {
        self.loopback("ADD", pod_id, netns_path)
    }

    fn detach_loopback(&self, pod_id: &str, netns_path: &str) -> anyhow::Result<()> {
        self.loopback("DEL", pod_id, netns_path)
    }

    fn add(&self, manager: &CniManager, conflist: &NetConfList) -> anyhow::Result<CniResult> {
        let (plugin_type, stdin) = Self::single_plugin_stdin(conflist)?;
        let args = CniArgs {
            command: "ADD".to_string(),
            container_id: manager.id.clone(),
            netns: manager.netns_path.clone(),
            args: manager.cni_args.clone(),
            ifname: manager.ifname.clone(),
            path: self.cni_path_env(),
        };
        let stdout = self.exec_plugin(&plugin_type, &stdin, &args)?;
        let result: CniResult = serde_json::from_slice(&stdout)?;
        Ok(result)
    }

    fn del(&self, manager: &CniManager, conflist: &NetConfList) -> anyhow::Result<()> {
        let (plugin_type, stdin) = Self::single_plugin_stdin(conflist)?;
        let args = CniArgs {
            command: "DEL".to_string(),
            container_id: manager.id.clone(),
            netns: manager.netns_path.clone(),
            args: manager.cni_args.clone(),
            ifname: manager.ifname.clone(),
            path: self.cni_path_env(),
        };
        self.exec_plugin(&plugin_type, &stdin, &args)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconf_types::conflist::{BridgePlugin, Ipam, Plugin};

    fn sample_conflist() -> NetConfList {
        NetConfList {
            cni_version: CURRENT_VERSION.to_string(),
            name: "net1".to_string(),
            plugins: vec![Plugin::Bridge(BridgePlugin {
                bridge: "0isula-br".to_string(),
                is_gateway: true,
                ip_masq: true,
                hairpin_mode: true,
                ipam: Ipam::host_local(
                    "192.168.0.0/24".parse().unwrap(),
                    "192.168.0.1".parse().unwrap(),
                ),
            })],
        }
    }

    #[test]
    fn single_plugin_stdin_carries_name_and_version() {
        let conflist = sample_conflist();
        let (plugin_type, stdin) = ProcessCniInvoker::single_plugin_stdin(&conflist).unwrap();
        assert_eq!(plugin_type, "bridge");
        let value: serde_json::Value = serde_json::from_slice(&stdin).unwrap();
        assert_eq!(value["cniVersion"], CURRENT_VERSION);
        assert_eq!(value["name"], "net1");
        assert_eq!(value["type"], "bridge");
    }

    #[test]
    fn missing_plugin_binary_is_a_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = ProcessCniInvoker::new(vec![dir.path().to_path_buf()]);
        let manager = CniManager {
            id: "c1".to_string(),
            netns_path: "/proc/1/ns/net".to_string(),
            cni_args: HashMap::new(),
            ifname: "eth0".to_string(),
            annotations: None,
        };
        let err = invoker.add(&manager, &sample_conflist()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
