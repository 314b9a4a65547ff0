//! Hostname redirection service.
//!
//! [`HostRedirector`] ties the pieces together: it makes sure the default
//! hosts file exists, picks the hosts file for the active storage profile,
//! reads it under a size limit, parses it and installs the result in the
//! [`RedirectionStore`] with a single rebuild.
//!
//! A reload is all or nothing. If anything fails before the rebuild the
//! previous table stays in place.

use crate::config::AppConfig;
use crate::error::{RedirectError, Result};
use crate::parser::HostsParser;
use crate::selector::HostsFileSelector;
use crate::store::{RedirectionStore, DEFAULT_HOSTS_FILE};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::{self, File};
use std::io::Read;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Quiet period after a file change before the table is reloaded.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Loads hosts files into a shared [`RedirectionStore`] and answers lookups.
#[derive(Clone)]
pub struct HostRedirector {
    /// The table lookups are served from.
    store: Arc<RedirectionStore>,

    /// Chooses which hosts file to load.
    selector: HostsFileSelector,

    parser: HostsParser,

    /// Hosts files must be strictly smaller than this.
    max_file_size: u64,

    /// Serializes reloads so two of them never interleave.
    reload_lock: Arc<Mutex<()>>,
}

impl HostRedirector {
    /// Creates a redirector with an empty table.
    pub fn new(selector: HostsFileSelector, parser: HostsParser, max_file_size: u64) -> Self {
        Self {
            store: Arc::new(RedirectionStore::new()),
            selector,
            parser,
            max_file_size,
            reload_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a redirector from the `storage` and `redirect` config sections.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            HostsFileSelector::new(&config.storage.root, config.storage_profile()),
            HostsParser::new(config.redirect.max_hostname_len),
            config.redirect.max_file_size,
        )
    }

    /// Uses `store` instead of the redirector's own table.
    pub fn with_store(mut self, store: Arc<RedirectionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> Arc<RedirectionStore> {
        Arc::clone(&self.store)
    }

    pub fn selector(&self) -> &HostsFileSelector {
        &self.selector
    }

    /// Writes the built-in hosts file to the default path if it is missing.
    ///
    /// Returns `true` when the file was created.
    pub fn ensure_default_file(&self) -> Result<bool> {
        let path = self.selector.default_path();
        if path.is_file() {
            return Ok(false);
        }

        info!(path = %path.display(), "Creating default hosts file because it does not exist");
        fs::create_dir_all(self.selector.hosts_dir())?;
        fs::write(&path, DEFAULT_HOSTS_FILE)?;
        Ok(true)
    }

    /// Reads a hosts file, refusing anything of `max_file_size` bytes or more.
    pub fn read_hosts_file(&self, path: &Path) -> Result<Vec<u8>> {
        let too_large = |size: u64| RedirectError::HostsFileTooLarge {
            path: path.display().to_string(),
            size,
            limit: self.max_file_size,
        };

        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size >= self.max_file_size {
            return Err(too_large(size));
        }

        // The file may grow between the size check and the read.
        let mut data = Vec::with_capacity(size as usize);
        file.take(self.max_file_size).read_to_end(&mut data)?;
        if data.len() as u64 >= self.max_file_size {
            return Err(too_large(data.len() as u64));
        }

        Ok(data)
    }

    /// Rebuilds the redirection table from the selected hosts file.
    ///
    /// With `add_defaults` the built-in entries are installed first and the
    /// file's entries override them. Malformed lines are skipped; only I/O
    /// failures and oversized files make this fail, in which case the
    /// current table is left untouched. Returns the new table size.
    pub fn initialize_redirections(&self, add_defaults: bool) -> Result<usize> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.ensure_default_file()? {
            debug!("Default hosts file created");
        }
        if add_defaults {
            debug!("Adding defaults to redirection list");
        }

        let path = self.selector.select();
        info!(
            path = %path.display(),
            profile = %self.selector.profile(),
            "Selected hosts file"
        );

        let data = self.read_hosts_file(&path)?;
        let outcome = self.parser.parse(&data);
        for issue in &outcome.issues {
            warn!(path = %path.display(), "Skipping hosts record: {}", issue);
        }

        let len = self.store.rebuild(add_defaults, outcome.entries);
        for (host, address) in self.store.snapshot() {
            debug!("    `{}` -> {}", host, address);
        }
        info!(
            path = %path.display(),
            redirections = len,
            skipped = outcome.issues.len(),
            "Redirection table loaded"
        );

        Ok(len)
    }

    /// Looks up a redirection for `hostname` (exact, case-sensitive).
    pub fn try_get_redirection(&self, hostname: &str) -> Option<Ipv4Addr> {
        let address = self.store.lookup(hostname);
        if let Some(addr) = address {
            debug!(hostname = %hostname, address = %addr, "Redirected hostname");
        }
        address
    }

    /// Path the next reload would read.
    pub fn selected_path(&self) -> PathBuf {
        self.selector.select()
    }

    /// Watches the hosts directory and reloads the table when it changes.
    ///
    /// Every successful reload sends the new table size on the returned
    /// channel. Failed reloads are logged and keep the previous table. The
    /// watcher stops when the receiver is dropped.
    pub fn start_watcher(&self, add_defaults: bool) -> Result<mpsc::Receiver<usize>> {
        let (tx, rx) = mpsc::channel(1);
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        let _ = notify_tx.send(());
                    }
                }
            },
            NotifyConfig::default(),
        )?;

        self.ensure_default_file()?;
        let watch_path = self.selector.hosts_dir();
        watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
        info!(path = %watch_path.display(), "Started watching hosts files for changes");

        let redirector = self.clone();
        std::thread::spawn(move || {
            // Keep the watcher alive for as long as this thread runs.
            let _watcher = watcher;

            while notify_rx.recv().is_ok() {
                // Let a burst of events settle before reloading.
                while notify_rx.recv_timeout(WATCH_DEBOUNCE).is_ok() {
                    debug!("Debouncing hosts reload");
                }

                match redirector.initialize_redirections(add_defaults) {
                    Ok(len) => {
                        if tx.blocking_send(len).is_err() {
                            debug!("Reload receiver dropped, stopping hosts watcher");
                            return;
                        }
                    }
                    Err(e) => error!("Failed to reload hosts file: {}", e),
                }
            }
            warn!("Hosts watcher channel closed");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::StorageProfile;
    use tempfile::TempDir;

    fn redirector(dir: &TempDir) -> HostRedirector {
        HostRedirector::new(
            HostsFileSelector::new(dir.path(), StorageProfile::System),
            HostsParser::default(),
            0x8000,
        )
    }

    #[test]
    fn test_ensure_default_file() {
        let dir = TempDir::new().unwrap();
        let redirector = redirector(&dir);

        assert!(redirector.ensure_default_file().unwrap());
        assert!(!redirector.ensure_default_file().unwrap());

        let written = fs::read_to_string(redirector.selector().default_path()).unwrap();
        assert_eq!(written, DEFAULT_HOSTS_FILE);
    }

    #[test]
    fn test_existing_default_file_kept() {
        let dir = TempDir::new().unwrap();
        let redirector = redirector(&dir);
        fs::create_dir_all(redirector.selector().hosts_dir()).unwrap();
        fs::write(redirector.selector().default_path(), "1.2.3.4 mine.com\n").unwrap();

        assert!(!redirector.ensure_default_file().unwrap());
        let contents = fs::read_to_string(redirector.selector().default_path()).unwrap();
        assert_eq!(contents, "1.2.3.4 mine.com\n");
    }

    #[test]
    fn test_read_hosts_file_limit() {
        let dir = TempDir::new().unwrap();
        let redirector = HostRedirector::new(
            HostsFileSelector::new(dir.path(), StorageProfile::System),
            HostsParser::default(),
            16,
        );

        let path = dir.path().join("hosts_small");
        fs::write(&path, "1.2.3.4 a.com\n").unwrap();
        assert_eq!(redirector.read_hosts_file(&path).unwrap(), b"1.2.3.4 a.com\n");

        let path = dir.path().join("hosts_exact");
        fs::write(&path, "1.2.3.4 abcd.com\n").unwrap();
        assert!(matches!(
            redirector.read_hosts_file(&path),
            Err(RedirectError::HostsFileTooLarge { size: 17, limit: 16, .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let redirector = redirector(&dir);
        let result = redirector.read_hosts_file(&dir.path().join("nope"));
        assert!(matches!(result, Err(RedirectError::Io(_))));
    }

    #[test]
    fn test_initialize_with_fresh_root() {
        let dir = TempDir::new().unwrap();
        let redirector = redirector(&dir);

        assert_eq!(redirector.initialize_redirections(false).unwrap(), 2);
        assert_eq!(
            redirector.try_get_redirection("receive-lp1.dg.srv.nintendo.net"),
            Some(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(redirector.selected_path(), redirector.selector().default_path());
    }

    #[test]
    fn test_shared_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RedirectionStore::new());
        let redirector = redirector(&dir).with_store(Arc::clone(&store));

        redirector.initialize_redirections(true).unwrap();
        assert_eq!(store.len(), 2);
        assert!(Arc::ptr_eq(&store, &redirector.store()));
    }
}
