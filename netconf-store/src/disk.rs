//! On-disk persistence for conflists: one file per network under a config
//! directory, written atomically and never silently overwritten.

use std::collections::HashSet;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use log::warn;
use netconf_types::conflist::NetConfList;
use netconf_types::error::is_already_exists_error;

#[derive(thiserror::Error, Debug)]
pub enum DiskStoreError {
    #[error("network config file for {0} already exists")]
    Exists(String),
    #[error("too many network config files in {0:?} (max {1})")]
    TooMany(PathBuf, usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub fn conflist_path(conf_dir: &Path, prefix: &str, suffix: &str, name: &str) -> PathBuf {
    conf_dir.join(format!("{prefix}{name}{suffix}"))
}

/// Writes `<conf_dir>/<prefix><name><suffix>` atomically (temp file, fsync,
/// rename) and returns the exact bytes written, to be cached in the record.
/// Refuses to clobber an existing file for the same name.
pub fn write_conflist(
    conf_dir: &Path,
    prefix: &str,
    suffix: &str,
    dir_mode: u32,
    file_mode: u32,
    conflist: &NetConfList,
) -> Result<Vec<u8>, DiskStoreError> {
    DirBuilder::new()
        .recursive(true)
        .mode(dir_mode)
        .create(conf_dir)?;

    let target = conflist_path(conf_dir, prefix, suffix, &conflist.name);
    // Reserve the target name with an exclusive create instead of a plain
    // `exists()` check, so two writers racing for the same network name
    // can't both pass the check and have the second clobber the first.
    if let Err(e) = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(file_mode)
        .open(&target)
    {
        let err = anyhow::Error::new(e);
        if is_already_exists_error(&err) {
            return Err(DiskStoreError::Exists(conflist.name.clone()));
        }
        return Err(DiskStoreError::Io(
            err.downcast::<std::io::Error>()
                .expect("io::Error wrapped via anyhow::Error::new"),
        ));
    }

    let bytes = serde_json::to_vec_pretty(conflist)?;
    let tmp_path = conf_dir.join(format!(".{}{}{}.tmp", prefix, conflist.name, suffix));
    {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(file_mode)
            .open(&tmp_path)?;
        tmp.write_all(&bytes)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, &target)?;
    Ok(bytes)
}

pub struct LoadedNetwork {
    pub conflist: NetConfList,
    pub raw_json: Vec<u8>,
}

/// Scans `conf_dir` for filenames beginning with `prefix`. A file that fails
/// to parse is logged and skipped; a network name seen more than once keeps
/// its first occurrence and logs the rest as ignored. Directory enumeration
/// order, not write order, decides which occurrence is "first".
pub fn load_all(
    conf_dir: &Path,
    prefix: &str,
    max_count: usize,
) -> Result<Vec<LoadedNetwork>, DiskStoreError> {
    if !conf_dir.exists() {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(conf_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            candidates.push(entry.path());
        }
    }
    if candidates.len() > max_count {
        return Err(DiskStoreError::TooMany(conf_dir.to_path_buf(), max_count));
    }

    let mut loaded = Vec::new();
    let mut seen_names = HashSet::new();
    for path in candidates {
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                warn!("skipping unreadable conflist {:?}: {}", path, e);
                continue;
            }
        };
        let conflist: NetConfList = match serde_json::from_slice(&bytes) {
            Ok(c) => c,
            Err(e) => {
                warn!("skipping malformed conflist {:?}: {}", path, e);
                continue;
            }
        };
        if !seen_names.insert(conflist.name.clone()) {
            warn!(
                "ignoring duplicate network name {:?} found in {:?}",
                conflist.name, path
            );
            continue;
        }
        loaded.push(LoadedNetwork { conflist, raw_json: bytes });
    }
    Ok(loaded)
}

pub fn remove_conflist(
    conf_dir: &Path,
    prefix: &str,
    suffix: &str,
    name: &str,
) -> std::io::Result<()> {
    fs::remove_file(conflist_path(conf_dir, prefix, suffix, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconf_types::conflist::NetConfList;

    fn sample(name: &str) -> NetConfList {
        NetConfList {
            cni_version: "1.0.0".to_string(),
            name: name.to_string(),
            plugins: vec![],
        }
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("net.d");
        write_conflist(&conf_dir, "isulad-network-", ".conflist", 0o755, 0o644, &sample("net1")).unwrap();

        let loaded = load_all(&conf_dir, "isulad-network-", 1000).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].conflist.name, "net1");
    }

    #[test]
    fn write_refuses_to_clobber_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("net.d");
        write_conflist(&conf_dir, "isulad-network-", ".conflist", 0o755, 0o644, &sample("net1")).unwrap();
        let err = write_conflist(&conf_dir, "isulad-network-", ".conflist", 0o755, 0o644, &sample("net1")).unwrap_err();
        assert!(matches!(err, DiskStoreError::Exists(name) if name == "net1"));
    }

    #[test]
    fn load_skips_malformed_file_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("net.d");
        fs::create_dir_all(&conf_dir).unwrap();
        fs::write(conf_dir.join("isulad-network-net1.conflist"), b"not json").unwrap();
        write_conflist(&conf_dir, "isulad-network-", ".conflist", 0o755, 0o644, &sample("net2")).unwrap();

        let loaded = load_all(&conf_dir, "isulad-network-", 1000).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].conflist.name, "net2");
    }

    #[test]
    fn load_enforces_max_file_count() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("net.d");
        fs::create_dir_all(&conf_dir).unwrap();
        for i in 0..3 {
            write_conflist(&conf_dir, "isulad-network-", ".conflist", 0o755, 0o644, &sample(&format!("net{i}"))).unwrap();
        }
        let err = load_all(&conf_dir, "isulad-network-", 2).unwrap_err();
        assert!(matches!(err, DiskStoreError::TooMany(_, 2)));
    }

    #[test]
    fn remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("net.d");
        write_conflist(&conf_dir, "isulad-network-", ".conflist", 0o755, 0o644, &sample("net1")).unwrap();
        remove_conflist(&conf_dir, "isulad-network-", ".conflist", "net1").unwrap();
        assert!(load_all(&conf_dir, "isulad-network-", 1000).unwrap().is_empty());
    }
}
