//! Thread-safe status store, readable while a cycle is writing.

use std::sync::{Arc, RwLock};

use crate::check::{CertStatus, EndpointStatus};

/// Latest status lists per resource category.
///
/// Each category is replaced wholesale by its scanner, never patched, so a
/// reader always observes a complete list from a single scan. Categories
/// replace independently: a snapshot may pair one category's newest data
/// with another category's previous cycle.
///
/// Locks are held only for the pointer swap or clone, never across I/O.
#[derive(Default)]
pub struct StatusStore {
    secrets: RwLock<Arc<Vec<CertStatus>>>,
    managed_certs: RwLock<Arc<Vec<CertStatus>>>,
    ingresses: RwLock<Arc<Vec<EndpointStatus>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the TLS-secret list. O(1) pointer swap under the lock.
    pub fn replace_secrets(&self, list: Vec<CertStatus>) {
        *self.secrets.write().expect("status store lock poisoned") = Arc::new(list);
    }

    /// Replace the managed-certificate list.
    pub fn replace_managed_certs(&self, list: Vec<CertStatus>) {
        *self.managed_certs.write().expect("status store lock poisoned") = Arc::new(list);
    }

    /// Replace the ingress-endpoint list.
    pub fn replace_ingresses(&self, list: Vec<EndpointStatus>) {
        *self.ingresses.write().expect("status store lock poisoned") = Arc::new(list);
    }

    /// Snapshot of the TLS-secret list. The returned list is immutable and
    /// unaffected by later replaces.
    pub fn secrets(&self) -> Arc<Vec<CertStatus>> {
        Arc::clone(&self.secrets.read().expect("status store lock poisoned"))
    }

    /// Snapshot of the managed-certificate list.
    pub fn managed_certs(&self) -> Arc<Vec<CertStatus>> {
        Arc::clone(&self.managed_certs.read().expect("status store lock poisoned"))
    }

    /// Snapshot of the ingress-endpoint list.
    pub fn ingresses(&self) -> Arc<Vec<EndpointStatus>> {
        Arc::clone(&self.ingresses.read().expect("status store lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Classification;

    fn record(name: &str) -> CertStatus {
        CertStatus {
            namespace: "default".to_string(),
            name: name.to_string(),
            classification: Classification::Valid,
            expires_at: None,
            days_until_expiry: 42,
            detail: String::new(),
        }
    }

    #[test]
    fn store_starts_empty() {
        let store = StatusStore::new();
        assert!(store.secrets().is_empty());
        assert!(store.managed_certs().is_empty());
        assert!(store.ingresses().is_empty());
    }

    #[test]
    fn replace_swaps_the_whole_list() {
        let store = StatusStore::new();
        store.replace_secrets(vec![record("a"), record("b")]);
        assert_eq!(store.secrets().len(), 2);

        store.replace_secrets(vec![record("c")]);
        let snapshot = store.secrets();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "c");
    }

    #[test]
    fn snapshot_is_detached_from_later_replaces() {
        let store = StatusStore::new();
        store.replace_secrets(vec![record("old")]);

        let before = store.secrets();
        store.replace_secrets(vec![record("new"), record("newer")]);

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].name, "old");
        assert_eq!(store.secrets().len(), 2);
    }

    #[test]
    fn categories_replace_independently() {
        let store = StatusStore::new();
        store.replace_secrets(vec![record("secret")]);
        store.replace_managed_certs(vec![record("cert")]);

        assert_eq!(store.secrets().len(), 1);
        assert_eq!(store.managed_certs().len(), 1);
        assert!(store.ingresses().is_empty());
    }
}
