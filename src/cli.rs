//! Command-line interface.

use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};

use crate::client::PeerClientConfig;
use crate::config::{
    DEFAULT_MAX_WAIT_SECS, DEFAULT_PASSWORD_ENV, DEFAULT_POD_PREFIX, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_REDIS_PORT, DirectorySettings, ReconcilerConfig, Settings,
};
use crate::report::ReportFormat;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Repair stale node addresses in a Redis Cluster StatefulSet.
///
/// Checks every peer's CLUSTER NODES against peer 0, forgets nodes at
/// addresses no live pod owns, re-meets every pod, waits for the cluster bus
/// to settle and checks again. Exits 0 when the cluster ends up consistent.
#[derive(Clone, Debug, Parser)]
#[command(name = "reconcile", version, about, long_about = None)]
pub struct Args {
    /// Namespace the Redis Cluster StatefulSet runs in
    pub namespace: String,

    /// Pod name prefix; peers are <POD_PREFIX>-<ordinal>
    #[arg(default_value = DEFAULT_POD_PREFIX)]
    pub pod_prefix: String,

    /// Number of peers (auto-detected from matching pods when omitted)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub num_pods: Option<u32>,

    /// Log intended FORGET/MEET commands without sending them
    #[arg(long, env = "DRY_RUN", value_parser = BoolishValueParser::new(), default_value_t = false)]
    pub dry_run: bool,

    /// Stop after the initial check when it is clean (`--skip-if-healthy=false`
    /// always runs the repair pass)
    #[arg(
        long,
        env = "SKIP_IF_HEALTHY",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub skip_if_healthy: bool,

    /// Redis client port on every peer
    #[arg(long, env = "REDIS_PORT", default_value_t = DEFAULT_REDIS_PORT)]
    pub port: u16,

    /// Give up waiting for convergence after this many seconds
    #[arg(long, env = "MAX_WAIT_SECS", default_value_t = DEFAULT_MAX_WAIT_SECS)]
    pub max_wait_secs: u64,

    /// Seconds between convergence polls
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_secs: u64,

    /// Environment variable holding the password in peer 0's container
    #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
    pub password_env: String,

    /// Container to read the password variable from (default: search all)
    #[arg(long)]
    pub container: Option<String>,

    /// The cluster does not require a password
    #[arg(long)]
    pub no_auth: bool,

    /// Reach peers through Kubernetes port-forwarding instead of pod IPs
    #[arg(long, env = "PORT_FORWARD", value_parser = BoolishValueParser::new(), default_value_t = false)]
    pub port_forward: bool,

    /// Redis connection timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Redis command timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub command_timeout_secs: u64,

    /// Log format (logs go to stderr)
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Report format (the report goes to stdout)
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub output: ReportFormat,
}

impl Args {
    /// Build run settings from parsed arguments.
    pub fn settings(&self) -> Settings {
        let directory = DirectorySettings {
            namespace: self.namespace.clone(),
            pod_prefix: self.pod_prefix.clone(),
            num_pods: self.num_pods,
            password_env: self.password_env.clone(),
            container: self.container.clone(),
            auth: !self.no_auth,
        };

        let reconciler = ReconcilerConfig::default()
            .with_dry_run(self.dry_run)
            .with_skip_if_healthy(self.skip_if_healthy)
            .with_port(self.port)
            .with_convergence(
                Duration::from_secs(self.max_wait_secs),
                Duration::from_secs(self.poll_interval_secs),
            );

        let client = PeerClientConfig::default()
            .with_connection_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_command_timeout(Duration::from_secs(self.command_timeout_secs));

        Settings {
            directory,
            reconciler,
            client,
            port_forward: self.port_forward,
        }
    }
}
