//! Managed-certificate scanner -- readiness of certificates whose lifecycle
//! is delegated to an external controller.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::check::classify::classify_managed;
use crate::check::store::StatusStore;
use crate::check::{CertStatus, Classification};
use crate::cluster::ManagedCertLister;

/// Condition type the managing controller reports readiness under.
const READY_CONDITION: &str = "Ready";

pub struct ManagedCertScanner {
    lister: Arc<dyn ManagedCertLister>,
    store: Arc<StatusStore>,
}

impl ManagedCertScanner {
    pub fn new(lister: Arc<dyn ManagedCertLister>, store: Arc<StatusStore>) -> Self {
        Self { lister, store }
    }

    /// Scan all managed certificates and replace the category's status list.
    ///
    /// The controller's Ready condition is trusted as-is; certificate bytes
    /// are never re-parsed here.
    pub async fn scan(&self) -> Result<usize> {
        let certs = self
            .lister
            .list_managed_certificates()
            .await
            .context("failed to list managed certificates")?;
        debug!(count = certs.len(), "managed certificate listing complete");

        let mut statuses = Vec::with_capacity(certs.len());
        for cert in &certs {
            let ready = cert
                .conditions
                .iter()
                .find(|c| c.condition_type == READY_CONDITION)
                .map(|c| (c.status.as_str(), c.reason.as_str()));
            let (classification, detail) = classify_managed(ready);

            if classification == Classification::Unready {
                warn!(
                    namespace = %cert.namespace,
                    certificate = %cert.name,
                    reason = %detail,
                    "managed certificate is not ready"
                );
            }

            statuses.push(CertStatus {
                namespace: cert.namespace.clone(),
                name: cert.name.clone(),
                classification,
                expires_at: None,
                days_until_expiry: 0,
                detail,
            });
        }

        let count = statuses.len();
        self.store.replace_managed_certs(statuses);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::cluster::{CertCondition, ManagedCertificate};

    struct StaticCertLister {
        result: Result<Vec<ManagedCertificate>, String>,
    }

    #[async_trait]
    impl ManagedCertLister for StaticCertLister {
        async fn list_managed_certificates(&self) -> Result<Vec<ManagedCertificate>> {
            match &self.result {
                Ok(items) => Ok(items.clone()),
                Err(msg) => Err(anyhow::anyhow!(msg.clone())),
            }
        }
    }

    fn cert(name: &str, conditions: Vec<CertCondition>) -> ManagedCertificate {
        ManagedCertificate {
            namespace: "ns".to_string(),
            name: name.to_string(),
            conditions,
        }
    }

    fn condition(condition_type: &str, status: &str, reason: &str) -> CertCondition {
        CertCondition {
            condition_type: condition_type.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
        }
    }

    fn scanner(result: Result<Vec<ManagedCertificate>, String>) -> (ManagedCertScanner, Arc<StatusStore>) {
        let store = Arc::new(StatusStore::new());
        let scanner = ManagedCertScanner::new(Arc::new(StaticCertLister { result }), store.clone());
        (scanner, store)
    }

    #[tokio::test]
    async fn unready_condition_carries_the_controller_reason() {
        let items = vec![
            cert("api-cert", vec![condition("Ready", "False", "CAIssuerNotReady")]),
            cert("web-cert", vec![condition("Ready", "True", "")]),
            cert("no-conditions", vec![]),
        ];
        let (scanner, store) = scanner(Ok(items));

        let count = scanner.scan().await.unwrap();
        assert_eq!(count, 3);

        let snapshot = store.managed_certs();
        assert_eq!(snapshot[0].classification, Classification::Unready);
        assert_eq!(snapshot[0].detail, "CAIssuerNotReady");
        assert_eq!(snapshot[1].classification, Classification::Valid);
        assert_eq!(snapshot[2].classification, Classification::Valid);
    }

    #[tokio::test]
    async fn unrelated_conditions_are_ignored() {
        let items = vec![cert(
            "api-cert",
            vec![condition("Issuing", "False", "Renewing")],
        )];
        let (scanner, store) = scanner(Ok(items));

        scanner.scan().await.unwrap();
        assert_eq!(store.managed_certs()[0].classification, Classification::Valid);
    }

    #[tokio::test]
    async fn listing_failure_leaves_previous_snapshot_intact() {
        let (scanner, store) = scanner(Err("api unreachable".to_string()));
        store.replace_managed_certs(vec![CertStatus {
            namespace: "ns".to_string(),
            name: "previous".to_string(),
            classification: Classification::Unready,
            expires_at: None,
            days_until_expiry: 0,
            detail: "Renewing".to_string(),
        }]);

        assert!(scanner.scan().await.is_err());
        assert_eq!(store.managed_certs()[0].name, "previous");
    }
}
