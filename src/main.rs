//! reconcile - repair stale node addresses in a Redis Cluster StatefulSet.
//!
//! This is the main entry point that:
//! - Parses arguments
//! - Initializes structured logging (stderr)
//! - Creates the Kubernetes client
//! - Runs one reconciliation and prints the report (stdout)

use std::process::ExitCode;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use redis_cluster_reconciler::cli::{Args, LogFormat};
use redis_cluster_reconciler::report;

/// Exit code when interrupted by SIGINT/SIGTERM.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        namespace = %args.namespace,
        pod_prefix = %args.pod_prefix,
        num_pods = ?args.num_pods,
        dry_run = args.dry_run,
        "Starting reconcile"
    );

    let settings = args.settings();

    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Kubernetes client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = redis_cluster_reconciler::run(client, &settings) => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, aborting without rollback");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(fatal = e.is_fatal(), "Reconciliation aborted: {}", e);
            println!("FAIL: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match report::render(&summary, args.output) {
        Ok(text) => print!("{}", text),
        Err(e) => error!("Failed to render report: {}", e),
    }

    ExitCode::from(summary.outcome.exit_code())
}

fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("redis_cluster_reconciler=info".parse()?)
        .add_directive("reconcile=info".parse()?)
        .add_directive("kube=warn".parse()?)
        .add_directive("fred=warn".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// If a handler cannot be installed that branch never fires; the run then
/// only ends on completion.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
