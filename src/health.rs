//! Host health view and the default in-memory status store.
//!
//! The selection core never mutates health state directly; it reads
//! availability and reports outcomes through the [`HealthView`] trait.
//! The process-wide table behind it is owned by the embedding proxy and
//! may throttle or defer writes. Reads tolerate staleness: a `mark_down`
//! is only guaranteed to become visible eventually.

use std::fmt;

use dashmap::DashMap;

/// Why a host was marked down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownReason {
    /// An active probe declared the host unhealthy.
    ActiveProbe,
    /// A live transaction saw a 5xx from the host.
    Passive5xx,
    /// A connection to the host could not be established.
    ConnectFail,
    /// The hostname resolved to the local process at load time.
    SelfDetect,
    /// An operator marked the host down administratively.
    Manual,
}

impl fmt::Display for DownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownReason::ActiveProbe => "active_probe",
            DownReason::Passive5xx => "passive_5xx",
            DownReason::ConnectFail => "connect_fail",
            DownReason::SelfDetect => "self_detect",
            DownReason::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Read-only projection of the host status store.
///
/// Hosts are keyed by hostname. Unknown hosts are available. Both mark
/// operations are idempotent; the store is free to apply them
/// asynchronously, so a reader may briefly observe the previous state.
pub trait HealthView: Send + Sync {
    /// Whether the host may receive traffic.
    fn is_available(&self, hostname: &str) -> bool;

    /// Takes the host out of rotation.
    fn mark_down(&self, hostname: &str, reason: DownReason);

    /// Returns the host to rotation.
    fn mark_up(&self, hostname: &str);
}

/// In-memory host status table.
///
/// Thread-safe via DashMap, keyed by hostname. Only down hosts are
/// stored; absence means available. Suitable as the process-wide default
/// store and as the test double for the selection core.
pub struct HostStatusStore {
    down: DashMap<String, DownReason>,
}

impl HostStatusStore {
    /// Creates an empty store with every host available.
    pub fn new() -> Self {
        Self {
            down: DashMap::new(),
        }
    }

    /// Why the host is down, if it is.
    pub fn down_reason(&self, hostname: &str) -> Option<DownReason> {
        self.down.get(hostname).map(|r| *r)
    }

    /// Number of hosts currently marked down.
    pub fn down_count(&self) -> usize {
        self.down.len()
    }
}

impl Default for HostStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthView for HostStatusStore {
    fn is_available(&self, hostname: &str) -> bool {
        !self.down.contains_key(hostname)
    }

    fn mark_down(&self, hostname: &str, reason: DownReason) {
        let prior = self.down.insert(hostname.to_string(), reason);
        if prior.is_none() {
            tracing::info!(host = hostname, reason = %reason, "host marked down");
        }
    }

    fn mark_up(&self, hostname: &str) {
        if self.down.remove(hostname).is_some() {
            tracing::info!(host = hostname, "host marked up");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_host_is_available() {
        let store = HostStatusStore::new();
        assert!(store.is_available("p1.example.com"));
    }

    #[test]
    fn test_mark_down_removes_from_rotation() {
        let store = HostStatusStore::new();
        store.mark_down("p1.example.com", DownReason::ConnectFail);
        assert!(!store.is_available("p1.example.com"));
        assert_eq!(
            store.down_reason("p1.example.com"),
            Some(DownReason::ConnectFail)
        );
    }

    #[test]
    fn test_mark_up_restores() {
        let store = HostStatusStore::new();
        store.mark_down("p1.example.com", DownReason::Passive5xx);
        store.mark_up("p1.example.com");
        assert!(store.is_available("p1.example.com"));
        assert_eq!(store.down_reason("p1.example.com"), None);
    }

    #[test]
    fn test_marks_are_idempotent() {
        let store = HostStatusStore::new();
        store.mark_down("p1.example.com", DownReason::ConnectFail);
        store.mark_down("p1.example.com", DownReason::ConnectFail);
        assert_eq!(store.down_count(), 1);

        store.mark_up("p1.example.com");
        store.mark_up("p1.example.com");
        assert!(store.is_available("p1.example.com"));
        assert_eq!(store.down_count(), 0);
    }

    #[test]
    fn test_later_mark_down_updates_reason() {
        let store = HostStatusStore::new();
        store.mark_down("p1.example.com", DownReason::ConnectFail);
        store.mark_down("p1.example.com", DownReason::Manual);
        assert_eq!(store.down_reason("p1.example.com"), Some(DownReason::Manual));
    }

    #[test]
    fn test_concurrent_marks() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(HostStatusStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    if i % 2 == 0 {
                        store.mark_down("p1.example.com", DownReason::Passive5xx);
                    } else {
                        store.mark_up("p1.example.com");
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // No panics = success
    }

    #[test]
    fn test_store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HostStatusStore>();
    }
}
