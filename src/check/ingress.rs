//! Ingress endpoint scanner -- live TLS probes against declared ingress
//! addresses and hostnames.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::check::classify::classify_handshake;
use crate::check::store::StatusStore;
use crate::check::{Classification, EndpointStatus};
use crate::cluster::{EndpointProber, IngressLister};

pub struct IngressScanner {
    lister: Arc<dyn IngressLister>,
    prober: Arc<dyn EndpointProber>,
    store: Arc<StatusStore>,
}

impl IngressScanner {
    pub fn new(
        lister: Arc<dyn IngressLister>,
        prober: Arc<dyn EndpointProber>,
        store: Arc<StatusStore>,
    ) -> Self {
        Self {
            lister,
            prober,
            store,
        }
    }

    /// Scan all TLS-enabled ingresses and replace the category's status
    /// list. Ingresses without a TLS block are excluded entirely.
    ///
    /// Each endpoint gets two independent probes: the load-balancer
    /// addresses (internal side) and the rule hosts (external side). An
    /// absent side is `Unknown`, never an error.
    pub async fn scan(&self) -> Result<usize> {
        let ingresses = self
            .lister
            .list_ingresses()
            .await
            .context("failed to list ingresses")?;
        debug!(count = ingresses.len(), "ingress listing complete");

        let mut statuses = Vec::new();
        for ingress in ingresses.iter().filter(|i| i.tls_enabled) {
            let (internal, external) = tokio::join!(
                self.probe_targets(&ingress.lb_addresses),
                self.probe_targets(&ingress.hosts),
            );

            info!(
                namespace = %ingress.namespace,
                ingress = %ingress.name,
                internal = %internal,
                external = %external,
                "ingress endpoint probed"
            );

            statuses.push(EndpointStatus {
                namespace: ingress.namespace.clone(),
                name: ingress.name.clone(),
                internal,
                external,
            });
        }

        let count = statuses.len();
        self.store.replace_ingresses(statuses);
        Ok(count)
    }

    /// Probe every target on one side and report the worst outcome.
    async fn probe_targets(&self, targets: &[String]) -> Classification {
        let mut worst: Option<Classification> = None;
        for target in targets {
            let outcome = self.prober.probe(&format!("https://{target}")).await;
            let classification = classify_handshake(outcome);
            worst = Some(match worst {
                Some(current) if severity(current) >= severity(classification) => current,
                _ => classification,
            });
        }
        worst.unwrap_or(Classification::Unknown)
    }
}

/// Probe outcomes ranked for worst-of aggregation: an unreachable endpoint
/// outranks one that is reachable without TLS.
fn severity(classification: Classification) -> u8 {
    match classification {
        Classification::HandshakeFailed => 2,
        Classification::HandshakeInvalid => 1,
        _ => 0,
    }
}
