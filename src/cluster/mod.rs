//! Cluster access layer -- listing capabilities consumed by the scanners
//! and the live TLS probe.
//!
//! The scanners only ever see these traits; the production implementations
//! ([`client::KubeClient`], [`probe::TlsProber`]) are swapped for scripted
//! fakes in tests.

pub mod client;
pub mod probe;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// Raw key/value material of one TLS-typed secret.
#[derive(Debug, Clone)]
pub struct TlsSecret {
    pub namespace: String,
    pub name: String,
    pub data: HashMap<String, Vec<u8>>,
}

/// One controller-reported condition on a managed certificate.
#[derive(Debug, Clone)]
pub struct CertCondition {
    pub condition_type: String,
    pub status: String,
    pub reason: String,
}

/// A certificate whose issuance and renewal are delegated to an external
/// controller. The controller's readiness condition is authoritative.
#[derive(Debug, Clone)]
pub struct ManagedCertificate {
    pub namespace: String,
    pub name: String,
    pub conditions: Vec<CertCondition>,
}

/// An ingress resource with its declared TLS state and reachable addresses.
#[derive(Debug, Clone)]
pub struct IngressEndpoint {
    pub namespace: String,
    pub name: String,
    pub tls_enabled: bool,
    /// Externally routable hostnames from the ingress rules.
    pub hosts: Vec<String>,
    /// Load-balancer-assigned addresses (IPs or hostnames).
    pub lb_addresses: Vec<String>,
}

/// Result of one TLS connection attempt against a live endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// The TCP dial reached the endpoint.
    pub connected: bool,
    /// A TLS session was negotiated on the connection.
    pub tls_negotiated: bool,
}

/// Lists all TLS-typed secrets across all namespaces.
#[async_trait]
pub trait SecretLister: Send + Sync {
    async fn list_tls_secrets(&self) -> Result<Vec<TlsSecret>>;
}

/// Lists all controller-managed certificates across all namespaces.
#[async_trait]
pub trait ManagedCertLister: Send + Sync {
    async fn list_managed_certificates(&self) -> Result<Vec<ManagedCertificate>>;
}

/// Lists all ingress resources across all namespaces.
#[async_trait]
pub trait IngressLister: Send + Sync {
    async fn list_ingresses(&self) -> Result<Vec<IngressEndpoint>>;
}

/// Attempts a TLS connection to a URL within a bounded timeout.
#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}
