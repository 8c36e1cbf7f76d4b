//! Runtime configuration.
//!
//! The CLI builds a [`Settings`] value; library callers can construct the
//! pieces directly.

use std::time::Duration;

use crate::client::PeerClientConfig;
use crate::error::Error;

/// Default StatefulSet pod name prefix.
pub const DEFAULT_POD_PREFIX: &str = "redis-cluster";

/// Default Redis client port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Environment variable holding the cluster password in peer containers.
pub const DEFAULT_PASSWORD_ENV: &str = "REDIS_PASSWORD";

/// Upper bound on the convergence wait.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 60;

/// Delay between convergence polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// How the peer directory finds peers and the credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectorySettings {
    /// Namespace the StatefulSet runs in.
    pub namespace: String,
    /// Pod name prefix; peers are `<pod_prefix>-<ordinal>`.
    pub pod_prefix: String,
    /// Explicit peer count. `None` auto-detects from matching pods.
    pub num_pods: Option<u32>,
    /// Environment variable holding the password in peer 0.
    pub password_env: String,
    /// Container to read the environment from. `None` searches all.
    pub container: Option<String>,
    /// Whether the cluster requires authentication.
    pub auth: bool,
}

impl DirectorySettings {
    /// Create settings for a namespace with every other field defaulted.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_prefix: DEFAULT_POD_PREFIX.to_string(),
            num_pods: None,
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
            container: None,
            auth: true,
        }
    }

    /// Set the pod prefix.
    pub fn with_pod_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pod_prefix = prefix.into();
        self
    }

    /// Set an explicit peer count.
    pub fn with_num_pods(mut self, num_pods: Option<u32>) -> Self {
        self.num_pods = num_pods;
        self
    }
}

/// Behaviour of one reconciliation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Exit early when the initial check finds no discrepancies.
    pub skip_if_healthy: bool,
    /// Log intended FORGET/MEET commands without sending them.
    pub dry_run: bool,
    /// Client port of every peer, used for CLUSTER MEET.
    pub port: u16,
    /// Upper bound on the convergence wait.
    pub max_wait: Duration,
    /// Delay between convergence polls.
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            skip_if_healthy: true,
            dry_run: false,
            port: DEFAULT_REDIS_PORT,
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl ReconcilerConfig {
    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set whether a healthy initial check ends the run.
    pub fn with_skip_if_healthy(mut self, skip: bool) -> Self {
        self.skip_if_healthy = skip;
        self
    }

    /// Set the peer client port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set convergence wait bounds.
    pub fn with_convergence(mut self, max_wait: Duration, poll_interval: Duration) -> Self {
        self.max_wait = max_wait;
        self.poll_interval = poll_interval;
        self
    }
}

/// Everything a full run needs.
#[derive(Clone, Debug)]
pub struct Settings {
    pub directory: DirectorySettings,
    pub reconciler: ReconcilerConfig,
    pub client: PeerClientConfig,
    /// Reach peers through Kubernetes port-forwarding instead of pod IPs.
    pub port_forward: bool,
}

impl Settings {
    /// Reject settings no run can succeed with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.directory.namespace.is_empty() {
            return Err(Error::Config("namespace must not be empty".to_string()));
        }
        if self.directory.pod_prefix.is_empty() {
            return Err(Error::Config("pod prefix must not be empty".to_string()));
        }
        if self.directory.num_pods == Some(0) {
            return Err(Error::Config("num_pods must be at least 1".to_string()));
        }
        if self.directory.auth && self.directory.password_env.is_empty() {
            return Err(Error::Config("password variable name must not be empty".to_string()));
        }
        if self.reconciler.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}
