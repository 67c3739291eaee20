//! Prometheus metrics for check cycles and certificate expiry.
//!
//! The registry is owned and injected rather than global, so tests can
//! build isolated instances.

use anyhow::Result;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::check::CheckCategory;

pub struct Metrics {
    registry: Registry,
    last_check_time: GaugeVec,
    error_counter: IntCounterVec,
    certificate_expiry_days: GaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let last_check_time = GaugeVec::new(
            Opts::new("last_check_time", "Unix time the check last finished"),
            &["check_name"],
        )?;
        let error_counter = IntCounterVec::new(
            Opts::new(
                "certificate_check_errors_total",
                "Total number of errors encountered during certificate checks",
            ),
            &["check_type", "error_type"],
        )?;
        let certificate_expiry_days = GaugeVec::new(
            Opts::new("certificate_expiry_days", "Days until certificate expiration"),
            &["namespace", "secret_name"],
        )?;

        registry.register(Box::new(last_check_time.clone()))?;
        registry.register(Box::new(error_counter.clone()))?;
        registry.register(Box::new(certificate_expiry_days.clone()))?;

        Ok(Self {
            registry,
            last_check_time,
            error_counter,
            certificate_expiry_days,
        })
    }

    /// Stamp the finish time of one category's scan.
    pub fn record_check_finished(&self, category: CheckCategory) {
        self.last_check_time
            .with_label_values(&[category.as_str()])
            .set(chrono::Utc::now().timestamp() as f64);
    }

    /// Count one failed scan for a category.
    pub fn record_scan_error(&self, category: CheckCategory, kind: &str) {
        self.error_counter
            .with_label_values(&[category.as_str(), kind])
            .inc();
    }

    /// Days-until-expiry gauge per secret; set only for material that
    /// actually parsed.
    pub fn observe_expiry_days(&self, namespace: &str, name: &str, days: i64) {
        self.certificate_expiry_days
            .with_label_values(&[namespace, name])
            .set(days as f64);
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_output_contains_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_check_finished(CheckCategory::TlsSecrets);
        metrics.record_scan_error(CheckCategory::Ingress, "check_error");
        metrics.observe_expiry_days("default", "web-tls", 12);

        let text = metrics.render().unwrap();
        assert!(text.contains("last_check_time"));
        assert!(text.contains("certificate_check_errors_total"));
        assert!(text.contains("certificate_expiry_days"));
        assert!(text.contains("tls-secrets"));
        assert!(text.contains("web-tls"));
    }

    #[test]
    fn error_counter_accumulates() {
        let metrics = Metrics::new().unwrap();
        metrics.record_scan_error(CheckCategory::CertManager, "check_error");
        metrics.record_scan_error(CheckCategory::CertManager, "check_error");

        let text = metrics.render().unwrap();
        assert!(text.contains("certificate_check_errors_total{check_type=\"cert-manager\",error_type=\"check_error\"} 2"));
    }
}
