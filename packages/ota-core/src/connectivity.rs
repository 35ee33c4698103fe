use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Fixed answer, for hosts that track connectivity themselves.
pub struct StaticConnectivity(pub bool);

impl Connectivity for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.0
    }
}

/// Probes `/sys/class/net` for an interface other than loopback that is up.
pub struct SystemConnectivity {
    net_dir: PathBuf,
}

impl Default for SystemConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConnectivity {
    pub fn new() -> Self {
        Self::with_net_dir("/sys/class/net")
    }

    pub fn with_net_dir(net_dir: impl Into<PathBuf>) -> Self {
        Self {
            net_dir: net_dir.into(),
        }
    }

    fn interface_is_up(dir: &Path) -> bool {
        let read = |name: &str| {
            fs::read_to_string(dir.join(name))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        match read("operstate").as_str() {
            "up" => true,
            // some virtual and mobile data links never report a state
            "unknown" => read("carrier") == "1",
            _ => false,
        }
    }
}

impl Connectivity for SystemConnectivity {
    fn is_online(&self) -> bool {
        let entries = match fs::read_dir(&self.net_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.net_dir.display(), error = %e, "cannot probe interfaces, assuming online");
                return true;
            }
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() != "lo")
            .any(|entry| Self::interface_is_up(&entry.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_interface(root: &Path, name: &str, operstate: &str, carrier: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("operstate"), format!("{}\n", operstate)).unwrap();
        if let Some(carrier) = carrier {
            fs::write(dir.join("carrier"), format!("{}\n", carrier)).unwrap();
        }
    }

    #[test]
    fn test_loopback_only_is_offline() {
        let root = tempfile::tempdir().unwrap();
        add_interface(root.path(), "lo", "unknown", Some("1"));
        assert!(!SystemConnectivity::with_net_dir(root.path()).is_online());
    }

    #[test]
    fn test_interface_up_is_online() {
        let root = tempfile::tempdir().unwrap();
        add_interface(root.path(), "lo", "unknown", Some("1"));
        add_interface(root.path(), "eth0", "down", Some("0"));
        add_interface(root.path(), "wlan0", "up", Some("1"));
        assert!(SystemConnectivity::with_net_dir(root.path()).is_online());
    }

    #[test]
    fn test_unknown_state_uses_carrier() {
        let root = tempfile::tempdir().unwrap();
        add_interface(root.path(), "rmnet_data0", "unknown", Some("1"));
        assert!(SystemConnectivity::with_net_dir(root.path()).is_online());

        let root = tempfile::tempdir().unwrap();
        add_interface(root.path(), "rmnet_data0", "unknown", None);
        assert!(!SystemConnectivity::with_net_dir(root.path()).is_online());
    }

    #[test]
    fn test_missing_sysfs_assumes_online() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does-not-exist");
        assert!(SystemConnectivity::with_net_dir(missing).is_online());
    }

    #[test]
    fn test_static_connectivity() {
        assert!(StaticConnectivity(true).is_online());
        assert!(!StaticConnectivity(false).is_online());
    }
}
