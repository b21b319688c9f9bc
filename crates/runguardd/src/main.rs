//! runguardd - local Run orchestration daemon
//!
//! Wires `RunServer` to an in-memory engine and a static namespace policy,
//! then serves one JSON request per stdin line, answering on stdout.
//! Logs go to stderr.

mod fixtures;
mod protocol;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use runguard_core::metrics::METRICS;
use runguard_core::telemetry::init_tracing;
use runguard_core::{
    AuthorizationMode, MetricsReportingAccess, NamespacePolicy, RunServer, ServerConfig,
};
use runguard_engine::fakes::MemoryRunEngine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn, Level};

use crate::fixtures::Fixtures;

#[derive(Parser, Debug)]
#[command(name = "runguardd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Authorization-scoped Run orchestration daemon", long_about = None)]
struct Cli {
    /// TOML server configuration
    #[arg(long, env = "RUNGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Resolve and authorize namespaces on every request
    #[arg(long)]
    multi_tenant: bool,

    /// Access check for metric reporting (trusted|authorized)
    #[arg(long)]
    metrics_reporting: Option<MetricsReportingAccess>,

    /// JSON namespace policy for the RBAC authorizer
    #[arg(long, env = "RUNGUARD_POLICY")]
    policy: Option<PathBuf>,

    /// JSON fixtures (experiments, pipelines, versions, runs) to seed
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    let mut config = config
        .apply_env()
        .context("Invalid runguard environment")?;
    if cli.multi_tenant {
        config.authorization_mode = AuthorizationMode::MultiTenant;
    }
    if let Some(access) = cli.metrics_reporting {
        config.metrics_reporting = access;
    }
    Ok(config)
}

fn load_policy(cli: &Cli, config: &ServerConfig) -> Result<NamespacePolicy> {
    match &cli.policy {
        Some(path) => NamespacePolicy::load(path)
            .with_context(|| format!("Failed to load policy {}", path.display())),
        None => {
            if config.is_multi_tenant() {
                warn!("multi-tenant mode without --policy: every scoped request will be denied");
            }
            Ok(NamespacePolicy::new())
        }
    }
}

async fn serve(server: &RunServer) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = protocol::handle_line(server, &line).await;
        reply.push('\n');
        stdout
            .write_all(reply.as_bytes())
            .await
            .context("Failed to write reply")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json_logs, level);

    let config = load_config(&cli)?;
    let policy = load_policy(&cli, &config)?;

    let engine = Arc::new(MemoryRunEngine::new());
    if let Some(path) = &cli.fixtures {
        let seeded = Fixtures::load(path)?.apply(&engine);
        info!(runs = seeded.len(), "fixtures loaded");
    }

    info!(
        mode = ?config.authorization_mode,
        metrics_reporting = ?config.metrics_reporting,
        "runguardd started"
    );
    let server = RunServer::new(engine, Arc::new(policy), config);
    let result = serve(&server).await;

    METRICS.flush();
    info!("runguardd stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "runguardd",
            "--multi-tenant",
            "--metrics-reporting",
            "authorized",
        ]);
        let config = load_config(&cli).unwrap();
        assert!(config.is_multi_tenant());
        assert_eq!(config.metrics_reporting, MetricsReportingAccess::Authorized);
    }

    #[test]
    fn bad_reporting_flag_rejected() {
        assert!(Cli::try_parse_from(["runguardd", "--metrics-reporting", "sometimes"]).is_err());
    }

    #[test]
    fn config_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_parameter_bytes = 128").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from(["runguardd", "--config", &path]);
        assert_eq!(load_config(&cli).unwrap().max_parameter_bytes, 128);
    }

    #[test]
    fn policy_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"principals":[{{"id":"ops","cluster_admin":true}}]}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from(["runguardd", "--policy", &path]);
        let policy = load_policy(&cli, &ServerConfig::default()).unwrap();
        assert!(policy.check(Some("ops"), "anywhere").is_allowed());
    }
}
