//! Pure certificate and endpoint classification.
//!
//! No I/O, no state: raw PEM bytes, a controller readiness condition, or a
//! probe outcome go in, a [`Classification`] comes out. All expiry math is
//! done against an explicit `now` so the functions stay deterministic under
//! test.

use chrono::{DateTime, Utc};
use x509_parser::pem::parse_x509_pem;

use crate::check::Classification;
use crate::cluster::ProbeOutcome;

/// Certificates expiring within this many days are flagged `ExpiringSoon`.
pub const EXPIRY_WARNING_DAYS: i64 = 7;

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Outcome of classifying one piece of certificate material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertVerdict {
    pub classification: Classification,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_until_expiry: i64,
    pub detail: String,
}

impl CertVerdict {
    fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            classification: Classification::ParseError,
            expires_at: None,
            days_until_expiry: 0,
            detail: detail.into(),
        }
    }

    /// Verdict for material that is absent altogether; PEM decoding is
    /// never attempted in this case.
    pub fn missing_material(detail: impl Into<String>) -> Self {
        Self {
            classification: Classification::MissingMaterial,
            expires_at: None,
            days_until_expiry: 0,
            detail: detail.into(),
        }
    }
}

/// Classify a single PEM-encoded CERTIFICATE block against `now`.
///
/// Anything other than exactly one parseable CERTIFICATE block yields
/// `ParseError` with no expiry. Otherwise the verdict is driven by
/// `days_until_expiry = floor((not_after - now) / 24h)`; Euclidean division
/// keeps the count negative for any certificate that is already past its
/// expiry, even by less than a day.
pub fn classify_certificate(pem: &[u8], now: DateTime<Utc>) -> CertVerdict {
    let (_, block) = match parse_x509_pem(pem) {
        Ok(parsed) => parsed,
        Err(e) => return CertVerdict::parse_error(format!("failed to decode PEM block: {e}")),
    };
    if block.label != "CERTIFICATE" {
        return CertVerdict::parse_error(format!("unexpected PEM block type {:?}", block.label));
    }
    let cert = match block.parse_x509() {
        Ok(cert) => cert,
        Err(e) => return CertVerdict::parse_error(format!("failed to parse certificate: {e}")),
    };

    let Some(expires_at) = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
    else {
        return CertVerdict::parse_error("certificate expiry out of representable range");
    };

    let days_until_expiry = (expires_at - now).num_seconds().div_euclid(SECONDS_PER_DAY);
    let (classification, detail) = if now > expires_at {
        (
            Classification::Expired,
            format!("certificate expired {} days ago", -days_until_expiry),
        )
    } else if days_until_expiry < EXPIRY_WARNING_DAYS {
        (
            Classification::ExpiringSoon,
            format!("certificate expires in {days_until_expiry} days"),
        )
    } else {
        (Classification::Valid, String::new())
    };

    CertVerdict {
        classification,
        expires_at: Some(expires_at),
        days_until_expiry,
        detail,
    }
}

/// Classify a managed certificate from its controller-reported Ready
/// condition: `(status, reason)` of the Ready condition, if present.
///
/// The managing controller's readiness signal is authoritative; certificate
/// bytes are deliberately not re-parsed here, since re-validating would
/// duplicate controller logic without adding information.
pub fn classify_managed(ready: Option<(&str, &str)>) -> (Classification, String) {
    match ready {
        Some((status, reason)) if status != "True" => {
            (Classification::Unready, reason.to_string())
        }
        _ => (Classification::Valid, String::new()),
    }
}

/// Classify a live TLS connection attempt.
pub fn classify_handshake(outcome: ProbeOutcome) -> Classification {
    if !outcome.connected {
        Classification::HandshakeFailed
    } else if !outcome.tls_negotiated {
        Classification::HandshakeInvalid
    } else {
        Classification::Valid
    }
}
