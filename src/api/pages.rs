//! Human-browsable HTML status pages.

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::error;

use super::state::AppState;
use crate::check::{CertStatus, EndpointStatus};

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/status/secrets", get(secrets_page))
        .route("/status/cert-manager", get(cert_manager_page))
        .route("/status/ingress", get(ingress_page))
}

/// Pre-rendered table row for the certificate categories.
struct CertRow {
    namespace: String,
    name: String,
    expiration: String,
    days: i64,
    status: String,
    detail: String,
}

impl From<&CertStatus> for CertRow {
    fn from(status: &CertStatus) -> Self {
        Self {
            namespace: status.namespace.clone(),
            name: status.name.clone(),
            expiration: status
                .expires_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            days: status.days_until_expiry,
            status: status.classification.to_string(),
            detail: status.detail.clone(),
        }
    }
}

struct EndpointRow {
    namespace: String,
    name: String,
    internal: String,
    external: String,
}

impl From<&EndpointStatus> for EndpointRow {
    fn from(status: &EndpointStatus) -> Self {
        Self {
            namespace: status.namespace.clone(),
            name: status.name.clone(),
            internal: status.internal.to_string(),
            external: status.external.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage {
    cluster_name: String,
}

#[derive(Template)]
#[template(path = "secrets.html")]
struct SecretsPage {
    rows: Vec<CertRow>,
}

#[derive(Template)]
#[template(path = "cert_manager.html")]
struct CertManagerPage {
    rows: Vec<CertRow>,
}

#[derive(Template)]
#[template(path = "ingress.html")]
struct IngressPage {
    rows: Vec<EndpointRow>,
}

async fn index(State(state): State<AppState>) -> Response {
    render(IndexPage {
        cluster_name: state.cluster_name.clone(),
    })
}

async fn secrets_page(State(state): State<AppState>) -> Response {
    let rows = state.store.secrets().iter().map(CertRow::from).collect();
    render(SecretsPage { rows })
}

async fn cert_manager_page(State(state): State<AppState>) -> Response {
    let rows = state.store.managed_certs().iter().map(CertRow::from).collect();
    render(CertManagerPage { rows })
}

async fn ingress_page(State(state): State<AppState>) -> Response {
    let rows = state.store.ingresses().iter().map(EndpointRow::from).collect();
    render(IngressPage { rows })
}

fn render<T: Template>(page: T) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::check::Classification;

    #[test]
    fn secrets_page_renders_rows() {
        let page = SecretsPage {
            rows: vec![CertRow {
                namespace: "prod".to_string(),
                name: "web-tls".to_string(),
                expiration: "2026-09-01".to_string(),
                days: 24,
                status: "valid".to_string(),
                detail: String::new(),
            }],
        };
        let html = page.render().unwrap();
        assert!(html.contains("Secrets Status"));
        assert!(html.contains("web-tls"));
        assert!(html.contains("2026-09-01"));
    }

    #[test]
    fn cert_row_formats_missing_expiry_as_unknown() {
        let status = CertStatus {
            namespace: "ns".to_string(),
            name: "broken".to_string(),
            classification: Classification::ParseError,
            expires_at: None,
            days_until_expiry: 0,
            detail: "failed to decode PEM block".to_string(),
        };
        let row = CertRow::from(&status);
        assert_eq!(row.expiration, "unknown");
        assert_eq!(row.status, "error parsing cert");
    }

    #[test]
    fn cert_row_formats_expiry_date() {
        let status = CertStatus {
            namespace: "ns".to_string(),
            name: "web-tls".to_string(),
            classification: Classification::Valid,
            expires_at: Some(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()),
            days_until_expiry: 24,
            detail: String::new(),
        };
        assert_eq!(CertRow::from(&status).expiration, "2026-09-01");
    }

    #[test]
    fn ingress_page_renders_both_probe_sides() {
        let page = IngressPage {
            rows: vec![EndpointRow {
                namespace: "prod".to_string(),
                name: "web".to_string(),
                internal: "valid".to_string(),
                external: "failed".to_string(),
            }],
        };
        let html = page.render().unwrap();
        assert!(html.contains("Internal SSL"));
        assert!(html.contains("failed"));
    }

    #[test]
    fn index_page_names_the_cluster() {
        let page = IndexPage {
            cluster_name: "prod-east".to_string(),
        };
        let html = page.render().unwrap();
        assert!(html.contains("prod-east"));
        assert!(html.contains("/status/secrets"));
    }
}
