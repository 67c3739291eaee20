//! TOML configuration for the CertWatch daemon.
//!
//! A layered model with compiled-in defaults, an environment variable
//! override for the config file path, and a standard filesystem location.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::check::orchestrator::RetryPolicy;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the certwatch process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertWatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub checks: CheckConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CertWatchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `CERTWATCH_CONFIG` environment variable.
    /// 2. `/etc/certwatch/certwatch.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("CERTWATCH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CERTWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/certwatch/certwatch.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Validate required settings before the daemon starts.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.cluster_name.is_empty() {
            bail!("cluster.cluster_name is required but not set");
        }
        cron::Schedule::from_str(&self.checks.schedule).with_context(|| {
            format!("checks.schedule is not a valid cron expression: {:?}", self.checks.schedule)
        })?;
        if self.checks.cycle_timeout_sec == 0 {
            bail!("checks.cycle_timeout_sec must be greater than zero");
        }
        if self.checks.retry_attempts == 0 {
            bail!("checks.retry_attempts must be at least 1");
        }
        if self.checks.probe_timeout_sec == 0 {
            bail!("checks.probe_timeout_sec must be greater than zero");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Admin HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the metrics / status page listener.
    pub listen_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9990".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// Cluster API connection configuration.
///
/// When `api_url` is unset the in-cluster service account environment is
/// used, which is the normal deployment mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Display name for the watched cluster (required).
    pub cluster_name: String,
    /// Explicit API server URL, e.g. `https://kube.example.com:6443`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Path to a bearer token file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
    /// Path to the API server CA bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_bundle_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Check-cycle scheduling, deadlines, and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Cron expression with a seconds field, e.g. `0 0 */12 * * *`.
    pub schedule: String,
    /// Shared deadline for all scans in one cycle (seconds).
    pub cycle_timeout_sec: u64,
    /// Attempts per scan within a cycle.
    pub retry_attempts: u32,
    /// Initial backoff between attempts; doubles each retry (milliseconds).
    pub retry_initial_backoff_ms: u64,
    /// Dial and handshake timeout for endpoint probes (seconds).
    pub probe_timeout_sec: u64,
    /// How recent the last successful cycle must be for the process to
    /// report healthy while a cycle is running (seconds).
    pub freshness_window_sec: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            schedule: "0 0 */12 * * *".to_string(),
            cycle_timeout_sec: 300,
            retry_attempts: 3,
            retry_initial_backoff_ms: 1000,
            probe_timeout_sec: 10,
            freshness_window_sec: 3600,
        }
    }
}

impl CheckConfig {
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_sec)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_sec)
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_sec)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = CertWatchConfig::default();

        assert_eq!(cfg.server.listen_address, "0.0.0.0:9990");

        assert!(cfg.cluster.cluster_name.is_empty());
        assert!(cfg.cluster.api_url.is_none());

        assert_eq!(cfg.checks.schedule, "0 0 */12 * * *");
        assert_eq!(cfg.checks.cycle_timeout_sec, 300);
        assert_eq!(cfg.checks.retry_attempts, 3);
        assert_eq!(cfg.checks.retry_initial_backoff_ms, 1000);
        assert_eq!(cfg.checks.probe_timeout_sec, 10);
        assert_eq!(cfg.checks.freshness_window_sec, 3600);

        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[server]
listen_address = "127.0.0.1:9100"

[cluster]
cluster_name = "prod-east"
api_url = "https://kube.example.com:6443"
token_path = "/opt/certwatch/token"

[checks]
schedule = "0 */30 * * * *"
cycle_timeout_sec = 120
retry_attempts = 5
retry_initial_backoff_ms = 250
probe_timeout_sec = 5
freshness_window_sec = 7200

[logging]
level = "debug"
"#;

        let cfg: CertWatchConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.server.listen_address, "127.0.0.1:9100");
        assert_eq!(cfg.cluster.cluster_name, "prod-east");
        assert_eq!(cfg.cluster.api_url.as_deref(), Some("https://kube.example.com:6443"));
        assert_eq!(cfg.cluster.token_path, Some(PathBuf::from("/opt/certwatch/token")));
        assert_eq!(cfg.checks.schedule, "0 */30 * * * *");
        assert_eq!(cfg.checks.cycle_timeout_sec, 120);
        assert_eq!(cfg.checks.retry_attempts, 5);
        assert_eq!(cfg.checks.retry_initial_backoff_ms, 250);
        assert_eq!(cfg.checks.probe_timeout_sec, 5);
        assert_eq!(cfg.checks.freshness_window_sec, 7200);
        assert_eq!(cfg.logging.level, "debug");

        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[cluster]
cluster_name = "staging"
"#;

        let cfg: CertWatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.cluster.cluster_name, "staging");
        assert_eq!(cfg.server.listen_address, "0.0.0.0:9990");
        assert_eq!(cfg.checks.cycle_timeout_sec, 300);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: CertWatchConfig = toml::from_str("").unwrap();
        let defaults = CertWatchConfig::default();

        assert_eq!(cfg.server.listen_address, defaults.server.listen_address);
        assert_eq!(cfg.checks.schedule, defaults.checks.schedule);
        assert_eq!(cfg.checks.freshness_window_sec, defaults.checks.freshness_window_sec);
    }

    #[test]
    fn test_validation_requires_cluster_name() {
        let cfg = CertWatchConfig::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cluster_name"));
    }

    #[test]
    fn test_validation_rejects_bad_cron() {
        let mut cfg = CertWatchConfig::default();
        cfg.cluster.cluster_name = "prod".to_string();
        cfg.checks.schedule = "not a schedule".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_budgets() {
        let mut cfg = CertWatchConfig::default();
        cfg.cluster.cluster_name = "prod".to_string();

        cfg.checks.retry_attempts = 0;
        assert!(cfg.validate().is_err());

        cfg.checks.retry_attempts = 3;
        cfg.checks.cycle_timeout_sec = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let cfg = CheckConfig::default();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(1000));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("certwatch.toml");
        std::fs::write(
            &path,
            r#"
[cluster]
cluster_name = "from-file"
"#,
        )
        .unwrap();

        let cfg = CertWatchConfig::load(&path).unwrap();
        assert_eq!(cfg.cluster.cluster_name, "from-file");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = CertWatchConfig::load(Path::new("/nonexistent/path/certwatch.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = CertWatchConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let roundtripped: CertWatchConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(cfg.server.listen_address, roundtripped.server.listen_address);
        assert_eq!(cfg.checks.schedule, roundtripped.checks.schedule);
        assert_eq!(cfg.checks.retry_attempts, roundtripped.checks.retry_attempts);
    }
}
