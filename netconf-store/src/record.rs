//! A single stored network: its conflist, the exact JSON bytes last written
//! for it, and the set of containers currently attached to it.

use std::sync::RwLock;

use netconf_types::conflist::NetConfList;

/// Guards only the container list. The map that owns this record's
/// existence is guarded by the registry's own lock one level up.
pub struct NetworkRecord {
    pub conflist: NetConfList,
    pub raw_json: Vec<u8>,
    containers: RwLock<Vec<String>>,
}

impl NetworkRecord {
    pub fn new(conflist: NetConfList, raw_json: Vec<u8>) -> Self {
        Self {
            conflist,
            raw_json,
            containers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.conflist.name
    }

    pub fn container_count(&self) -> usize {
        self.containers.read().expect("container list lock poisoned").len()
    }

    pub fn is_in_use(&self) -> bool {
        self.container_count() > 0
    }

    pub fn add_container(&self, pod_id: impl Into<String>) {
        self.containers
            .write()
            .expect("container list lock poisoned")
            .push(pod_id.into());
    }

    /// Removes the first exact match of `pod_id`, if present. Used by detach,
    /// which removes membership regardless of whether the CNI delete for
    /// this network itself succeeded.
    pub fn remove_container(&self, pod_id: &str) {
        let mut containers = self.containers.write().expect("container list lock poisoned");
        if let Some(pos) = containers.iter().position(|c| c == pod_id) {
            containers.remove(pos);
        }
    }

    pub fn containers(&self) -> Vec<String> {
        self.containers.read().expect("container list lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconf_types::conflist::NetConfList;

    fn sample() -> NetworkRecord {
        NetworkRecord::new(
            NetConfList {
                cni_version: "1.0.0".to_string(),
                name: "net1".to_string(),
                plugins: vec![],
            },
            b"{}".to_vec(),
        )
    }

    #[test]
    fn tracks_container_membership() {
        let record = sample();
        assert!(!record.is_in_use());
        record.add_container("c1");
        record.add_container("c2");
        assert_eq!(record.container_count(), 2);
        record.remove_container("c1");
        assert_eq!(record.containers(), vec!["c2".to_string()]);
        record.remove_container("c2");
        assert!(!record.is_in_use());
    }

    #[test]
    fn remove_container_ignores_unknown_id() {
        let record = sample();
        record.add_container("c1");
        record.remove_container("does-not-exist");
        assert_eq!(record.container_count(), 1);
    }
}
