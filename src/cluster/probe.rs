//! Live TLS handshake probe.
//!
//! Dials an HTTPS endpoint and reports whether the TCP connection and the
//! TLS negotiation each succeeded. Certificate chains are deliberately NOT
//! validated: the probe asserts that an endpoint actually serves TLS, not
//! that its chain is trustworthy. This is a reachability check, not a
//! security assertion.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring::default_provider;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, Error, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::{EndpointProber, ProbeOutcome};

/// Default HTTPS port when the probed URL does not carry one.
const DEFAULT_TLS_PORT: u16 = 443;

// ---------------------------------------------------------------------------
// Permissive verifier
// ---------------------------------------------------------------------------

/// A permissive server certificate verifier that accepts any presented
/// certificate. Chain validity is judged separately from the declared
/// cluster state; the probe only establishes that TLS is actually served.
#[derive(Debug)]
struct AcceptAnyServerCert {
    supported_schemes: Vec<SignatureScheme>,
}

impl AcceptAnyServerCert {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            supported_schemes: provider
                .signature_verification_algorithms
                .supported_schemes(),
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        // Handshake integrity is still enforced even though the chain is not.
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported_schemes.clone()
    }
}

// ---------------------------------------------------------------------------
// Prober
// ---------------------------------------------------------------------------

/// Probes endpoints with a bounded dial and handshake timeout.
pub struct TlsProber {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let provider = default_provider();
        let verifier = Arc::new(AcceptAnyServerCert::new(&provider));

        let config = ClientConfig::builder_with_provider(Arc::new(provider))
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .context("failed to set TLS protocol versions")?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
        })
    }
}

#[async_trait]
impl EndpointProber for TlsProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let (host, port) = match parse_target(url) {
            Ok(target) => target,
            Err(e) => {
                debug!(%url, error = %e, "unprobeable target");
                return ProbeOutcome { connected: false, tls_negotiated: false };
            }
        };

        let dial = TcpStream::connect((host.as_str(), port));
        let stream = match tokio::time::timeout(self.timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(%host, port, error = %e, "dial failed");
                return ProbeOutcome { connected: false, tls_negotiated: false };
            }
            Err(_) => {
                debug!(%host, port, "dial timed out");
                return ProbeOutcome { connected: false, tls_negotiated: false };
            }
        };

        let server_name = match ServerName::try_from(host.clone()) {
            Ok(name) => name,
            Err(e) => {
                debug!(%host, error = %e, "host is not a valid TLS server name");
                return ProbeOutcome { connected: true, tls_negotiated: false };
            }
        };

        match tokio::time::timeout(self.timeout, self.connector.connect(server_name, stream)).await
        {
            Ok(Ok(_)) => ProbeOutcome { connected: true, tls_negotiated: true },
            Ok(Err(e)) => {
                debug!(%host, port, error = %e, "TLS handshake failed");
                ProbeOutcome { connected: true, tls_negotiated: false }
            }
            Err(_) => {
                debug!(%host, port, "TLS handshake timed out");
                ProbeOutcome { connected: true, tls_negotiated: false }
            }
        }
    }
}

/// Extract `(host, port)` from an `https://` URL, tolerating bare hosts,
/// explicit ports, paths, and IPv6 literals.
fn parse_target(url: &str) -> Result<(String, u16)> {
    let rest = url.strip_prefix("https://").unwrap_or(url);
    let host_port = rest.split(['/', '?']).next().unwrap_or(rest);

    if host_port.is_empty() {
        bail!("empty host in probe target {url:?}");
    }

    // Bracketed IPv6: [::1] or [::1]:8443.
    if let Some(inner) = host_port.strip_prefix('[') {
        let Some((host, remainder)) = inner.split_once(']') else {
            bail!("unterminated IPv6 literal in {url:?}");
        };
        let port = match remainder.strip_prefix(':') {
            Some(p) => p.parse().with_context(|| format!("invalid port in {url:?}"))?,
            None => DEFAULT_TLS_PORT,
        };
        return Ok((host.to_string(), port));
    }

    // Bare IPv6 literal without a port.
    if host_port.matches(':').count() > 1 {
        return Ok((host_port.to_string(), DEFAULT_TLS_PORT));
    }

    match host_port.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {url:?}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((host_port.to_string(), DEFAULT_TLS_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host() {
        assert_eq!(
            parse_target("https://app.example.com").unwrap(),
            ("app.example.com".to_string(), 443)
        );
    }

    #[test]
    fn parses_host_with_port_and_path() {
        assert_eq!(
            parse_target("https://app.example.com:8443/healthz").unwrap(),
            ("app.example.com".to_string(), 8443)
        );
    }

    #[test]
    fn parses_ip_without_scheme() {
        assert_eq!(
            parse_target("10.0.0.1").unwrap(),
            ("10.0.0.1".to_string(), 443)
        );
    }

    #[test]
    fn parses_ipv6_literals() {
        assert_eq!(parse_target("https://[::1]:8443").unwrap(), ("::1".to_string(), 8443));
        assert_eq!(
            parse_target("2001:db8::2").unwrap(),
            ("2001:db8::2".to_string(), 443)
        );
    }

    #[test]
    fn rejects_empty_and_malformed_targets() {
        assert!(parse_target("https://").is_err());
        assert!(parse_target("https://host:notaport").is_err());
        assert!(parse_target("https://[::1").is_err());
    }

    #[test]
    fn permissive_verifier_accepts_any_certificate() {
        let verifier = AcceptAnyServerCert::new(&default_provider());
        let dummy_cert = CertificateDer::from(vec![0u8; 1]);
        let server_name = ServerName::try_from("example.com").unwrap();
        let result =
            verifier.verify_server_cert(&dummy_cert, &[], &server_name, &[], UnixTime::now());
        assert!(result.is_ok());
    }

    #[test]
    fn prober_builds_with_default_timeout() {
        assert!(TlsProber::new(Duration::from_secs(10)).is_ok());
    }

    #[tokio::test]
    async fn unprobeable_target_reports_not_connected() {
        let prober = TlsProber::new(Duration::from_millis(100)).unwrap();
        let outcome = prober.probe("https://").await;
        assert_eq!(outcome, ProbeOutcome { connected: false, tls_negotiated: false });
    }
}
