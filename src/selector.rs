//! Hosts file selection.
//!
//! Each storage profile has its own preferred hosts files under
//! `<root>/hosts/`, with `hosts/default` as the common fallback:
//!
//! | Profile              | Candidates, in order                                  |
//! |----------------------|-------------------------------------------------------|
//! | System               | `hosts/sysmmc`, `hosts/default`                       |
//! | Emulated (`id`)      | `hosts/emummc_{id:04x}`, `hosts/emummc`, `hosts/default` |

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the directory holding hosts files, relative to the storage root.
pub const HOSTS_DIR: &str = "hosts";

/// Name of the fallback hosts file.
pub const DEFAULT_HOSTS_NAME: &str = "default";

/// The storage profile the system booted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageProfile {
    /// Regular system storage.
    #[default]
    System,
    /// Emulated storage with its numeric ID.
    Emulated { id: u32 },
}

impl fmt::Display for StorageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageProfile::System => write!(f, "sysmmc"),
            StorageProfile::Emulated { id } => write!(f, "emummc ({:04x})", id),
        }
    }
}

/// Picks the hosts file to load for a storage profile.
#[derive(Debug, Clone)]
pub struct HostsFileSelector {
    root: PathBuf,
    profile: StorageProfile,
}

impl HostsFileSelector {
    pub fn new(root: impl Into<PathBuf>, profile: StorageProfile) -> Self {
        Self {
            root: root.into(),
            profile,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profile(&self) -> StorageProfile {
        self.profile
    }

    /// Directory holding all hosts files.
    pub fn hosts_dir(&self) -> PathBuf {
        self.root.join(HOSTS_DIR)
    }

    /// The fallback hosts file, which is created when missing.
    pub fn default_path(&self) -> PathBuf {
        self.hosts_dir().join(DEFAULT_HOSTS_NAME)
    }

    /// Candidate paths in order of preference, ending with the default.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let dir = self.hosts_dir();
        let mut paths = match self.profile {
            StorageProfile::System => vec![dir.join("sysmmc")],
            StorageProfile::Emulated { id } => {
                vec![dir.join(format!("emummc_{:04x}", id)), dir.join("emummc")]
            }
        };
        paths.push(self.default_path());
        paths
    }

    /// Returns the first existing candidate, or the default path.
    pub fn select(&self) -> PathBuf {
        let default = self.default_path();
        for path in self.candidates() {
            if path == default || path.is_file() {
                return path;
            }
            debug!(path = %path.display(), "Skipping hosts file because it does not exist");
        }
        default
    }
}
