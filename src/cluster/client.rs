//! Typed client for the cluster's REST API.
//!
//! Deliberately thin: bearer-token auth, three list calls, and serde
//! response types narrowed to the fields the scanners consume. Connection
//! settings come from explicit configuration or the in-cluster service
//! account environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Certificate, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    CertCondition, IngressEndpoint, IngressLister, ManagedCertLister, ManagedCertificate,
    SecretLister, TlsSecret,
};

/// Secret type tag carrying TLS keypairs.
const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// In-cluster service account mount.
const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Timeout applied to every listing request.
const API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cluster API returned {status} for {path}")]
    Status { status: StatusCode, path: String },
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection settings resolved from config or the in-cluster environment.
#[derive(Debug, Clone)]
pub struct KubeSettings {
    pub api_url: String,
    pub token: String,
    pub ca_bundle: Option<Vec<u8>>,
}

impl KubeSettings {
    /// Resolve settings from explicit config values, falling back to the
    /// service account environment a pod runs with.
    pub fn resolve(
        api_url: Option<&str>,
        token_path: Option<&Path>,
        ca_path: Option<&Path>,
    ) -> Result<Self> {
        let api_url = match api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST")
                    .context("KUBERNETES_SERVICE_HOST not set and no cluster.api_url configured")?;
                let port =
                    std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{host}:{port}")
            }
        };

        let token_path = token_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(SERVICE_ACCOUNT_TOKEN));
        let token = std::fs::read_to_string(&token_path)
            .with_context(|| format!("failed to read bearer token from {}", token_path.display()))?
            .trim()
            .to_string();

        let ca_path = ca_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(SERVICE_ACCOUNT_CA));
        let ca_bundle = match std::fs::read(&ca_path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %ca_path.display(), error = %e, "cluster CA bundle not readable; using system roots");
                None
            }
        };

        Ok(Self { api_url, token, ca_bundle })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct KubeClient {
    http: Client,
    base_url: String,
    token: String,
}

impl KubeClient {
    pub fn new(settings: KubeSettings) -> Result<Self> {
        let mut builder = Client::builder().timeout(API_TIMEOUT).use_rustls_tls();
        if let Some(ca) = &settings.ca_bundle {
            builder = builder.add_root_certificate(
                Certificate::from_pem(ca).context("invalid cluster CA bundle")?,
            );
        }
        let http = builder.build().context("failed to build cluster HTTP client")?;

        Ok(Self {
            http,
            base_url: settings.api_url,
            token: settings.token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%path, "listing cluster resources");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { status, path: path.to_string() }.into());
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {path}"))
    }
}

#[async_trait]
impl SecretLister for KubeClient {
    async fn list_tls_secrets(&self) -> Result<Vec<TlsSecret>> {
        let list: SecretList = self
            .get_json("/api/v1/secrets?fieldSelector=type%3Dkubernetes.io%2Ftls")
            .await?;

        let mut secrets = Vec::with_capacity(list.items.len());
        for item in list.items {
            // The field selector already narrows the listing; filter again
            // in case the API server ignores it for this resource version.
            if item.secret_type != TLS_SECRET_TYPE {
                continue;
            }
            let namespace = item.metadata.namespace;
            let name = item.metadata.name;

            let mut data = HashMap::with_capacity(item.data.len());
            for (key, value) in item.data {
                match BASE64.decode(value.as_bytes()) {
                    Ok(bytes) => {
                        data.insert(key, bytes);
                    }
                    Err(e) => warn!(
                        namespace = %namespace,
                        secret = %name,
                        %key,
                        error = %e,
                        "skipping undecodable secret entry"
                    ),
                }
            }
            secrets.push(TlsSecret { namespace, name, data });
        }
        Ok(secrets)
    }
}

#[async_trait]
impl ManagedCertLister for KubeClient {
    async fn list_managed_certificates(&self) -> Result<Vec<ManagedCertificate>> {
        let list: CertificateList = self.get_json("/apis/cert-manager.io/v1/certificates").await?;

        Ok(list
            .items
            .into_iter()
            .map(|item| ManagedCertificate {
                namespace: item.metadata.namespace,
                name: item.metadata.name,
                conditions: item
                    .status
                    .conditions
                    .into_iter()
                    .map(|c| CertCondition {
                        condition_type: c.condition_type,
                        status: c.status,
                        reason: c.reason,
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl IngressLister for KubeClient {
    async fn list_ingresses(&self) -> Result<Vec<IngressEndpoint>> {
        let list: IngressList = self.get_json("/apis/networking.k8s.io/v1/ingresses").await?;

        Ok(list
            .items
            .into_iter()
            .map(|item| IngressEndpoint {
                namespace: item.metadata.namespace,
                name: item.metadata.name,
                tls_enabled: !item.spec.tls.is_empty(),
                hosts: item
                    .spec
                    .rules
                    .into_iter()
                    .filter_map(|r| r.host)
                    .filter(|h| !h.is_empty())
                    .collect(),
                lb_addresses: item
                    .status
                    .load_balancer
                    .ingress
                    .into_iter()
                    .filter_map(|a| a.ip.or(a.hostname))
                    .filter(|a| !a.is_empty())
                    .collect(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct SecretList {
    #[serde(default)]
    items: Vec<SecretItem>,
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(rename = "type", default)]
    secret_type: String,
    #[serde(default)]
    data: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CertificateList {
    #[serde(default)]
    items: Vec<CertificateItem>,
}

#[derive(Debug, Deserialize)]
struct CertificateItem {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    status: CertificateStatus,
}

#[derive(Debug, Deserialize, Default)]
struct CertificateStatus {
    #[serde(default)]
    conditions: Vec<ConditionItem>,
}

#[derive(Debug, Deserialize)]
struct ConditionItem {
    #[serde(rename = "type", default)]
    condition_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct IngressList {
    #[serde(default)]
    items: Vec<IngressItem>,
}

#[derive(Debug, Deserialize)]
struct IngressItem {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: IngressSpec,
    #[serde(default)]
    status: IngressStatusField,
}

#[derive(Debug, Deserialize, Default)]
struct IngressSpec {
    #[serde(default)]
    tls: Vec<IngressTls>,
    #[serde(default)]
    rules: Vec<IngressRule>,
}

#[derive(Debug, Deserialize, Default)]
struct IngressTls {
    #[serde(rename = "secretName", default)]
    #[allow(dead_code)]
    secret_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct IngressRule {
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct IngressStatusField {
    #[serde(rename = "loadBalancer", default)]
    load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Deserialize, Default)]
struct LoadBalancerStatus {
    #[serde(default)]
    ingress: Vec<LoadBalancerAddress>,
}

#[derive(Debug, Deserialize, Default)]
struct LoadBalancerAddress {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
}
