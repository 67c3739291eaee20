use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use certwatch::check::Classification;
use certwatch::config::CertWatchConfig;

#[derive(Parser)]
#[command(
    name = "certwatch",
    about = "Cluster TLS certificate expiry and endpoint watcher",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML config file (default: $CERTWATCH_CONFIG, then
    /// /etc/certwatch/certwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (admin server + scheduler + check engine)
    Serve {
        /// Bind address override
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one check cycle immediately and print the results
    Check {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CertWatchConfig::load(path)?,
        None => CertWatchConfig::load_or_default(),
    };

    // RUST_LOG wins; the configured level is the fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    config.validate()?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.listen_address = bind;
            }
            tracing::info!("starting certwatch daemon");
            certwatch::serve(config).await?;
        }
        Commands::Check { json } => {
            let run = certwatch::check_once(&config).await?;

            if json {
                let scans: Vec<_> = run
                    .report
                    .scans
                    .iter()
                    .map(|scan| match &scan.outcome {
                        Ok(count) => serde_json::json!({
                            "category": scan.category,
                            "ok": true,
                            "records": count,
                        }),
                        Err(e) => serde_json::json!({
                            "category": scan.category,
                            "ok": false,
                            "error": e.to_string(),
                        }),
                    })
                    .collect();
                let secrets = run.store.secrets();
                let managed = run.store.managed_certs();
                let ingresses = run.store.ingresses();
                let output = serde_json::json!({
                    "started_at": run.report.started_at.to_rfc3339(),
                    "success": run.report.is_success(),
                    "scans": scans,
                    "secrets": &*secrets,
                    "cert_manager": &*managed,
                    "ingress": &*ingresses,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("\nCertWatch Check Cycle");
                println!("{:<15} | {:<6} | Details", "Category", "Result");
                println!("{:-<15}-|-{:-<6}-|-{:-<40}", "", "", "");
                for scan in &run.report.scans {
                    match &scan.outcome {
                        Ok(count) => {
                            println!("{:<15} | {:<6} | {} records", scan.category, "OK", count)
                        }
                        Err(e) => println!("{:<15} | {:<6} | {}", scan.category, "FAIL", e),
                    }
                }

                let secrets = run.store.secrets();
                let attention: Vec<_> = secrets
                    .iter()
                    .filter(|s| s.classification != Classification::Valid)
                    .collect();
                if !attention.is_empty() {
                    println!("\nCertificates needing attention:");
                    for status in attention {
                        println!(
                            " - {}/{}: {} ({} days)",
                            status.namespace,
                            status.name,
                            status.classification,
                            status.days_until_expiry
                        );
                    }
                }
                println!();
            }

            if !run.report.is_success() {
                anyhow::bail!(
                    "check cycle completed with {} failures",
                    run.report.failures()
                );
            }
        }
    }

    Ok(())
}
