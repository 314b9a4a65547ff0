//! In-memory redirection table.
//!
//! The table is only ever replaced as a whole. A rebuild assembles the new
//! map without holding the lock and then swaps it in, so concurrent lookups
//! see either the previous table or the new one, never a mix.

use crate::parser::{parse_hosts, HostEntry};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::debug;

/// Built-in hosts payload, used as the baseline when defaults are requested
/// and written out as the default hosts file when none exists.
pub const DEFAULT_HOSTS_FILE: &str = "# Nintendo telemetry servers\n\
127.0.0.1 receive-lp1.dg.srv.nintendo.net\n\
127.0.0.1 receive-lp1.er.srv.nintendo.net\n";

/// Owns the hostname-to-address table and serves lookups.
#[derive(Debug, Default)]
pub struct RedirectionStore {
    table: RwLock<HashMap<String, Ipv4Addr>>,
}

impl RedirectionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries parsed from [`DEFAULT_HOSTS_FILE`].
    pub fn default_entries() -> Vec<HostEntry> {
        parse_hosts(DEFAULT_HOSTS_FILE.as_bytes()).entries
    }

    /// Replaces the whole table.
    ///
    /// Defaults go in first when `include_defaults` is set, followed by
    /// `entries` in order. A later entry overwrites an earlier one with the
    /// same hostname. Returns the number of distinct hostnames.
    pub fn rebuild<I>(&self, include_defaults: bool, entries: I) -> usize
    where
        I: IntoIterator<Item = HostEntry>,
    {
        let mut table = HashMap::new();
        if include_defaults {
            table.extend(
                Self::default_entries()
                    .into_iter()
                    .map(|e| (e.hostname, e.address)),
            );
        }
        table.extend(entries.into_iter().map(|e| (e.hostname, e.address)));

        let len = table.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        debug!(entries = len, include_defaults, "Redirection table rebuilt");

        len
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, hostname: &str) -> Option<Ipv4Addr> {
        self.read().get(hostname).copied()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All entries of the current table, sorted by hostname.
    pub fn snapshot(&self) -> Vec<(String, Ipv4Addr)> {
        let mut entries: Vec<_> = self
            .read()
            .iter()
            .map(|(host, addr)| (host.clone(), *addr))
            .collect();
        entries.sort();
        entries
    }

    // The table is replaced by a single assignment, so a poisoned lock still
    // guards a complete map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Ipv4Addr>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(host: &str, a: u8, b: u8, c: u8, d: u8) -> HostEntry {
        HostEntry::new(host, Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = RedirectionStore::new();
        assert!(store.is_empty());
        assert_eq!(store.lookup("anything"), None);
    }

    #[test]
    fn test_default_entries() {
        let defaults = RedirectionStore::default_entries();
        let loopback = Ipv4Addr::new(127, 0, 0, 1);
        assert_eq!(
            defaults,
            vec![
                HostEntry::new("receive-lp1.dg.srv.nintendo.net", loopback),
                HostEntry::new("receive-lp1.er.srv.nintendo.net", loopback),
            ]
        );
    }

    #[test]
    fn test_rebuild_with_defaults() {
        let store = RedirectionStore::new();
        let len = store.rebuild(true, vec![entry("a.com", 10, 0, 0, 1)]);

        assert_eq!(len, 3);
        assert_eq!(
            store.lookup("receive-lp1.dg.srv.nintendo.net"),
            Some(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(store.lookup("a.com"), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_file_entries_override_defaults() {
        let store = RedirectionStore::new();
        store.rebuild(
            true,
            vec![entry("receive-lp1.er.srv.nintendo.net", 95, 216, 149, 205)],
        );

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.lookup("receive-lp1.er.srv.nintendo.net"),
            Some(Ipv4Addr::new(95, 216, 149, 205))
        );
    }

    #[test]
    fn test_later_entry_wins() {
        let store = RedirectionStore::new();
        store.rebuild(
            false,
            vec![entry("dup.com", 1, 1, 1, 1), entry("dup.com", 2, 2, 2, 2)],
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("dup.com"), Some(Ipv4Addr::new(2, 2, 2, 2)));
    }

    #[test]
    fn test_rebuild_replaces_everything() {
        let store = RedirectionStore::new();
        store.rebuild(true, vec![entry("old.com", 1, 2, 3, 4)]);
        store.rebuild(false, vec![entry("new.com", 5, 6, 7, 8)]);

        assert_eq!(store.lookup("old.com"), None);
        assert_eq!(store.lookup("receive-lp1.dg.srv.nintendo.net"), None);
        assert_eq!(store.lookup("new.com"), Some(Ipv4Addr::new(5, 6, 7, 8)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let store = RedirectionStore::new();
        store.rebuild(false, vec![entry("a.com", 1, 2, 3, 4)]);

        assert!(store.lookup("a.com").is_some());
        assert_eq!(store.lookup("A.com"), None);
        assert_eq!(store.lookup("a.com."), None);
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = RedirectionStore::new();
        store.rebuild(
            false,
            vec![entry("b.com", 2, 2, 2, 2), entry("a.com", 1, 1, 1, 1)],
        );
        assert_eq!(
            store.snapshot(),
            vec![
                ("a.com".to_string(), Ipv4Addr::new(1, 1, 1, 1)),
                ("b.com".to_string(), Ipv4Addr::new(2, 2, 2, 2)),
            ]
        );
    }

    #[test]
    fn test_concurrent_rebuild_never_mixes_tables() {
        const HOSTS: [&str; 8] = [
            "h0.com", "h1.com", "h2.com", "h3.com", "h4.com", "h5.com", "h6.com", "h7.com",
        ];
        let generation = |n: u8| -> Vec<HostEntry> {
            HOSTS.iter().map(|h| entry(h, 10, 0, 0, n)).collect()
        };

        let store = Arc::new(RedirectionStore::new());
        store.rebuild(false, generation(1));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = store.snapshot();
                        assert_eq!(snapshot.len(), HOSTS.len());
                        let first = snapshot[0].1;
                        assert!(snapshot.iter().all(|(_, addr)| *addr == first));

                        let addr = store.lookup("h3.com").expect("h3.com always present");
                        assert!(
                            addr == Ipv4Addr::new(10, 0, 0, 1)
                                || addr == Ipv4Addr::new(10, 0, 0, 2)
                        );
                    }
                })
            })
            .collect();

        for i in 0..500 {
            store.rebuild(false, generation(if i % 2 == 0 { 2 } else { 1 }));
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
