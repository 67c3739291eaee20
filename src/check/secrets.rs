//! TLS secret scanner -- expiry classification of `kubernetes.io/tls`
//! secrets across all namespaces.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use crate::check::classify::{classify_certificate, CertVerdict};
use crate::check::store::StatusStore;
use crate::check::{CertStatus, Classification};
use crate::cluster::SecretLister;
use crate::metrics::Metrics;

/// Key under which a TLS secret stores its certificate chain.
const TLS_CERT_KEY: &str = "tls.crt";

pub struct SecretScanner {
    lister: Arc<dyn SecretLister>,
    store: Arc<StatusStore>,
    metrics: Arc<Metrics>,
}

impl SecretScanner {
    pub fn new(
        lister: Arc<dyn SecretLister>,
        store: Arc<StatusStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            lister,
            store,
            metrics,
        }
    }

    /// Scan all TLS secrets and replace the category's status list.
    ///
    /// A listing failure aborts the scan and leaves the previous snapshot in
    /// place. A secret whose material is absent or unparseable still
    /// produces a record, so the published list is never silently shorter
    /// than the cluster's.
    pub async fn scan(&self) -> Result<usize> {
        let secrets = self
            .lister
            .list_tls_secrets()
            .await
            .context("failed to list TLS secrets")?;
        debug!(count = secrets.len(), "TLS secret listing complete");

        let now = Utc::now();
        let mut statuses = Vec::with_capacity(secrets.len());
        for secret in &secrets {
            let verdict = match secret.data.get(TLS_CERT_KEY) {
                Some(pem) => classify_certificate(pem, now),
                None => CertVerdict::missing_material("secret has no tls.crt entry"),
            };

            match verdict.classification {
                Classification::Expired => warn!(
                    namespace = %secret.namespace,
                    secret = %secret.name,
                    days = verdict.days_until_expiry,
                    "certificate is expired"
                ),
                Classification::ExpiringSoon => warn!(
                    namespace = %secret.namespace,
                    secret = %secret.name,
                    days = verdict.days_until_expiry,
                    "certificate is expiring soon"
                ),
                Classification::ParseError | Classification::MissingMaterial => warn!(
                    namespace = %secret.namespace,
                    secret = %secret.name,
                    detail = %verdict.detail,
                    "certificate material unusable"
                ),
                _ => {}
            }

            if matches!(
                verdict.classification,
                Classification::Valid | Classification::ExpiringSoon
            ) {
                self.metrics.observe_expiry_days(
                    &secret.namespace,
                    &secret.name,
                    verdict.days_until_expiry,
                );
            }

            statuses.push(CertStatus {
                namespace: secret.namespace.clone(),
                name: secret.name.clone(),
                classification: verdict.classification,
                expires_at: verdict.expires_at,
                days_until_expiry: verdict.days_until_expiry,
                detail: verdict.detail,
            });
        }

        let count = statuses.len();
        self.store.replace_secrets(statuses);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::cluster::TlsSecret;

    struct StaticSecretLister {
        result: Result<Vec<TlsSecret>, String>,
    }

    #[async_trait]
    impl SecretLister for StaticSecretLister {
        async fn list_tls_secrets(&self) -> Result<Vec<TlsSecret>> {
            match &self.result {
                Ok(items) => Ok(items.clone()),
                Err(msg) => Err(anyhow::anyhow!(msg.clone())),
            }
        }
    }

    fn secret(namespace: &str, name: &str, data: HashMap<String, Vec<u8>>) -> TlsSecret {
        TlsSecret {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data,
        }
    }

    fn cert_pem(days_from_now: i64) -> Vec<u8> {
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
        let mut params = rcgen::CertificateParams::new(vec!["example.com".to_string()]).unwrap();
        let not_after = time::OffsetDateTime::now_utc() + time::Duration::days(days_from_now)
            + time::Duration::hours(1);
        params.not_before = not_after - time::Duration::days(365);
        params.not_after = not_after;
        params
            .self_signed(&key_pair)
            .unwrap()
            .pem()
            .into_bytes()
    }

    fn scanner(result: Result<Vec<TlsSecret>, String>) -> (SecretScanner, Arc<StatusStore>) {
        let store = Arc::new(StatusStore::new());
        let scanner = SecretScanner::new(
            Arc::new(StaticSecretLister { result }),
            store.clone(),
            Arc::new(Metrics::new().unwrap()),
        );
        (scanner, store)
    }

    #[tokio::test]
    async fn classifies_every_secret_even_when_some_fail_to_parse() {
        let items = vec![
            secret(
                "ns",
                "good",
                HashMap::from([(TLS_CERT_KEY.to_string(), cert_pem(90))]),
            ),
            secret(
                "ns",
                "garbage",
                HashMap::from([(TLS_CERT_KEY.to_string(), b"not pem at all".to_vec())]),
            ),
            secret("ns", "keyless", HashMap::new()),
        ];
        let (scanner, store) = scanner(Ok(items));

        let count = scanner.scan().await.unwrap();
        assert_eq!(count, 3);

        let snapshot = store.secrets();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].classification, Classification::Valid);
        assert_eq!(snapshot[1].classification, Classification::ParseError);
        assert_eq!(snapshot[1].expires_at, None);
        assert_eq!(snapshot[2].classification, Classification::MissingMaterial);
    }

    #[tokio::test]
    async fn expiring_soon_secret_is_flagged_with_days() {
        let items = vec![secret(
            "ns",
            "web-tls",
            HashMap::from([(TLS_CERT_KEY.to_string(), cert_pem(3))]),
        )];
        let (scanner, store) = scanner(Ok(items));

        scanner.scan().await.unwrap();
        let snapshot = store.secrets();
        assert_eq!(snapshot[0].namespace, "ns");
        assert_eq!(snapshot[0].name, "web-tls");
        assert_eq!(snapshot[0].classification, Classification::ExpiringSoon);
        assert_eq!(snapshot[0].days_until_expiry, 3);
    }

    #[tokio::test]
    async fn listing_failure_leaves_previous_snapshot_intact() {
        let (scanner, store) = scanner(Err("cluster unavailable".to_string()));
        store.replace_secrets(vec![CertStatus {
            namespace: "ns".to_string(),
            name: "previous".to_string(),
            classification: Classification::Valid,
            expires_at: None,
            days_until_expiry: 10,
            detail: String::new(),
        }]);

        let err = scanner.scan().await.unwrap_err();
        assert!(err.to_string().contains("failed to list TLS secrets"));

        let snapshot = store.secrets();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "previous");
    }
}
