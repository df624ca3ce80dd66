//! Existence-only probe for a CNI plugin binary across a set of search
//! directories, used before a plugin is referenced in an assembled conflist.

use std::path::Path;

/// True iff any of `search_paths`, in order, contains an entry named
/// `plugin`. Only checks existence, not executability or file-vs-directory.
pub fn plugin_exists(plugin: &str, search_paths: &[impl AsRef<Path>]) -> bool {
    search_paths
        .iter()
        .any(|dir| dir.as_ref().join(plugin).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_plugin_in_second_path() {
        let empty = tempfile::tempdir().unwrap();
        let populated = tempfile::tempdir().unwrap();
        std::fs::write(populated.path().join("bridge"), b"").unwrap();

        let paths = vec![empty.path().to_path_buf(), populated.path().to_path_buf()];
        assert!(plugin_exists("bridge", &paths));
        assert!(!plugin_exists("portmap", &paths));
    }

    #[test]
    fn empty_search_path_list_never_finds_anything() {
        let paths: Vec<std::path::PathBuf> = vec![];
        assert!(!plugin_exists("bridge", &paths));
    }
}
