//! Certificate and endpoint checks -- classification, resource scanners,
//! the status store, and the single-flight cycle orchestrator.

pub mod classify;
pub mod ingress;
pub mod managed;
pub mod orchestrator;
pub mod secrets;
pub mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Resource categories covered by a check cycle.
///
/// Each category is bound to its scanner at compile time, so there is no
/// "unknown task" dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckCategory {
    TlsSecrets,
    CertManager,
    Ingress,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 3] = [
        CheckCategory::TlsSecrets,
        CheckCategory::CertManager,
        CheckCategory::Ingress,
    ];

    /// Stable label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::TlsSecrets => "tls-secrets",
            CheckCategory::CertManager => "cert-manager",
            CheckCategory::Ingress => "ingress",
        }
    }
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health verdict assigned to one certificate or TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Valid,
    ExpiringSoon,
    Expired,
    MissingMaterial,
    ParseError,
    Unready,
    HandshakeFailed,
    HandshakeInvalid,
    Unknown,
}

impl Classification {
    /// Human-readable label shown on status pages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Valid => "valid",
            Classification::ExpiringSoon => "expiring soon",
            Classification::Expired => "expired",
            Classification::MissingMaterial => "missing cert",
            Classification::ParseError => "error parsing cert",
            Classification::Unready => "not ready",
            Classification::HandshakeFailed => "failed",
            Classification::HandshakeInvalid => "invalid",
            Classification::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest status of one TLS secret or managed certificate.
#[derive(Debug, Clone, Serialize)]
pub struct CertStatus {
    pub namespace: String,
    pub name: String,
    pub classification: Classification,
    /// Absent when the certificate material could not be parsed.
    pub expires_at: Option<DateTime<Utc>>,
    /// Negative once the certificate has expired.
    pub days_until_expiry: i64,
    /// Human-readable cause, e.g. a renewal-failure reason.
    pub detail: String,
}

/// Latest probe status of one TLS-enabled ingress endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub namespace: String,
    pub name: String,
    /// Probe result against the load-balancer-assigned addresses.
    pub internal: Classification,
    /// Probe result against the externally routable rule hosts.
    pub external: Classification,
}
