//! Cluster Snapshot CLI
//!
//! Resolves configuration, connects to the API server and runs one backup.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cluster_snapshot::{
    adapters::KubeControlPlane,
    config::{BackupConfig, BackupMode, FailurePolicy, OutputFormat, VersionPolicy},
    metrics,
    snapshot::run_backup,
    Error,
};

#[derive(Parser)]
#[command(name = "cluster-snapshot")]
#[command(version)]
#[command(about = "Back up Kubernetes resources to portable JSON files", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// YAML configuration file
    #[arg(long, global = true, env = "CLUSTER_SNAPSHOT_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig of the cluster to back up
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Summary output format
    #[arg(long, global = true, value_enum)]
    format: Option<FormatArg>,

    /// Directory in which the backup directory is created
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// What to do when listing or writing fails
    #[arg(long, global = true, value_enum)]
    on_error: Option<FailureArg>,

    /// Which version to back up for each group or custom resource
    #[arg(long, global = true, value_enum)]
    version_policy: Option<VersionArg>,

    /// Items per list request
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Write Prometheus metrics to this file when done
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    /// Abort the backup after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every declared custom resource (default)
    Create,

    /// Back up every listable resource in the allowed group-versions
    Cluster {
        /// Group-version to include, e.g. `v1` or `rbac.authorization.k8s.io/v1`
        #[arg(long = "allow")]
        allow: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Table,
    Json,
    Yaml,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailureArg {
    Abort,
    Skip,
}

#[derive(Clone, Copy, ValueEnum)]
enum VersionArg {
    FirstListed,
    Preferred,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = resolve_config(cli)?;
    config.validate()?;

    let plane = KubeControlPlane::connect(config.kubeconfig.as_deref(), config.context.as_deref())
        .await
        .context("failed to connect to the cluster")?;

    let backup = run_backup(&plane, &config);
    let result = tokio::select! {
        result = with_deadline(backup, config.timeout_seconds) => result,
        _ = shutdown_signal() => {
            error!("Backup interrupted, files written so far are kept");
            Err(anyhow::anyhow!("backup interrupted by signal"))
        }
    };

    if let Some(path) = &config.metrics_file {
        if let Err(e) = metrics::write_textfile(path) {
            error!(error = %e, "Failed to write metrics file");
        }
    }

    let report = result?;
    print!("{}", report.render(config.format)?);
    Ok(())
}

/// Load the config file, then apply command-line overrides
fn resolve_config(cli: Cli) -> anyhow::Result<BackupConfig> {
    let mut config = match &cli.config {
        Some(path) => BackupConfig::from_file(path)?,
        None => BackupConfig::default(),
    };

    match cli.command {
        None | Some(Commands::Create) => config.mode = BackupMode::Declared,
        Some(Commands::Cluster { allow }) => {
            config.mode = BackupMode::Cluster;
            if !allow.is_empty() {
                config.allowed_group_versions = allow.into_iter().collect();
            }
        }
    }

    if cli.kubeconfig.is_some() {
        config.kubeconfig = cli.kubeconfig;
    }
    if cli.context.is_some() {
        config.context = cli.context;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(format) = cli.format {
        config.format = match format {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        };
    }
    if let Some(policy) = cli.on_error {
        config.failure_policy = match policy {
            FailureArg::Abort => FailurePolicy::Abort,
            FailureArg::Skip => FailurePolicy::Skip,
        };
    }
    if let Some(policy) = cli.version_policy {
        config.version_policy = match policy {
            VersionArg::FirstListed => VersionPolicy::FirstListed,
            VersionArg::Preferred => VersionPolicy::Preferred,
        };
    }
    if cli.page_size.is_some() {
        config.page_size = cli.page_size;
    }
    if cli.metrics_file.is_some() {
        config.metrics_file = cli.metrics_file;
    }
    if cli.timeout.is_some() {
        config.timeout_seconds = cli.timeout;
    }

    Ok(config)
}

/// Run `backup`, giving up after `timeout_seconds` if set
async fn with_deadline<F, T>(backup: F, timeout_seconds: Option<u64>) -> anyhow::Result<T>
where
    F: std::future::Future<Output = cluster_snapshot::Result<T>>,
{
    let result = match timeout_seconds {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), backup)
            .await
            .unwrap_or(Err(Error::TimedOut(secs))),
        None => backup.await,
    };
    Ok(result?)
}

/// Initialize tracing subscriber; logs go to stderr, the summary to stdout
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
