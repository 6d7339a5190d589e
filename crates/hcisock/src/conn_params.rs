//! Connection parameter override
//!
//! The kernel initiates the LE connection on behalf of the shadow socket, so
//! the timing the caller asked for in its create connection command has to be
//! pushed into the controller's debugfs defaults beforehand.

use crate::hci::packet::ConnectionParameters;
use log::{trace, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes connection timing into `<root>/hci<N>/...`
#[derive(Debug, Clone)]
pub struct ConnectionParameterOverride {
    debugfs_root: PathBuf,
}

impl ConnectionParameterOverride {
    pub fn new(debugfs_root: impl Into<PathBuf>) -> Self {
        Self {
            debugfs_root: debugfs_root.into(),
        }
    }

    pub fn debugfs_root(&self) -> &Path {
        &self.debugfs_root
    }

    /// Applies all four values, in order. Failures are logged, never returned.
    pub fn apply(&self, dev_id: u16, params: &ConnectionParameters) {
        let dir = self.debugfs_root.join(format!("hci{}", dev_id));
        let entries = [
            ("conn_min_interval", params.min_interval),
            ("conn_max_interval", params.max_interval),
            ("conn_latency", params.latency),
            ("supervision_timeout", params.supervision_timeout),
        ];

        for (name, value) in entries {
            let path = dir.join(name);
            match fs::write(&path, format!("{}\n", value)) {
                Ok(()) => trace!("{} <- {}", path.display(), value),
                Err(e) => warn!("Failed to write {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParameters {
        ConnectionParameters {
            min_interval: 6,
            max_interval: 12,
            latency: 0,
            supervision_timeout: 3200,
        }
    }

    #[test]
    fn test_apply_writes_each_parameter() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("hci1")).unwrap();

        ConnectionParameterOverride::new(root.path()).apply(1, &params());

        let read = |name: &str| fs::read_to_string(root.path().join("hci1").join(name)).unwrap();
        assert_eq!(read("conn_min_interval"), "6\n");
        assert_eq!(read("conn_max_interval"), "12\n");
        assert_eq!(read("conn_latency"), "0\n");
        assert_eq!(read("supervision_timeout"), "3200\n");
    }

    #[test]
    fn test_apply_failure_is_swallowed() {
        let root = tempfile::tempdir().unwrap();

        // hci7 does not exist, every write fails
        ConnectionParameterOverride::new(root.path()).apply(7, &params());

        assert!(!root.path().join("hci7").exists());
    }
}
