//! Redis client wrapper using the fred crate.
//!
//! Each peer is reached with its own single-node (non-clustered) connection:
//! the reconciler must talk to one specific node, never be redirected.

use std::collections::HashMap;
use std::time::Duration;

use fred::prelude::*;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::client::types::{MembershipSnapshot, ParseError};
use crate::directory::PeerRef;
use crate::transport::ConnectionStrategy;

/// Errors that can occur while talking to a single peer.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("No route to peer {0}")]
    NoRoute(String),
}

/// Connection settings shared by every peer connection.
#[derive(Clone, Debug)]
pub struct PeerClientConfig {
    /// Connection timeout.
    pub connection_timeout: Duration,
    /// Command timeout.
    pub command_timeout: Duration,
    /// Password for AUTH, if the cluster requires one.
    pub password: Option<String>,
}

impl Default for PeerClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            password: None,
        }
    }
}

impl PeerClientConfig {
    /// Set password.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

// Password is a credential and must not end up in logs.
impl std::fmt::Display for PeerClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "connect_timeout={:?} command_timeout={:?} auth={}",
            self.connection_timeout,
            self.command_timeout,
            self.password.is_some()
        )
    }
}

/// Peer client speaking the Redis protocol to individual cluster nodes.
///
/// Connections are opened lazily and cached per peer name. A connection that
/// fails a command is dropped from the cache so the next call reconnects.
pub struct RedisPeerClient {
    config: PeerClientConfig,
    strategy: ConnectionStrategy,
    connections: Mutex<HashMap<String, Client>>,
}

impl RedisPeerClient {
    pub fn new(config: PeerClientConfig, strategy: ConnectionStrategy) -> Self {
        Self {
            config,
            strategy,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &PeerClientConfig {
        &self.config
    }

    /// Open a single-node connection to `host:port`.
    #[instrument(skip_all, fields(host = %host, port = %port))]
    async fn connect_single(&self, host: &str, port: u16) -> Result<Client, PeerError> {
        let mut redis_config = Config {
            server: ServerConfig::Centralized {
                server: Server::new(host, port),
            },
            ..Default::default()
        };

        if let Some(ref pass) = self.config.password {
            redis_config.password = Some(pass.clone());
        }

        let command_timeout = self.config.command_timeout;
        let connection_timeout = self.config.connection_timeout;

        let client = Builder::from_config(redis_config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connection_timeout;
            })
            .build()?;

        let init = client.init();
        match tokio::time::timeout(connection_timeout, init).await {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                return Err(PeerError::Timeout {
                    operation: format!("connect {}:{}", host, port),
                    duration: connection_timeout,
                });
            }
        }

        debug!("Connected to peer");
        Ok(client)
    }

    /// Get a cached connection for the peer, connecting if needed.
    async fn connection(&self, peer: &PeerRef) -> Result<Client, PeerError> {
        let mut connections = self.connections.lock().await;
        if let Some(client) = connections.get(&peer.name) {
            return Ok(client.clone());
        }

        let (host, port) = self
            .strategy
            .endpoint_for(peer)
            .ok_or_else(|| PeerError::NoRoute(peer.name.clone()))?;
        let client = self
            .connect_single(&host, port)
            .await
            .map_err(|e| PeerError::Connection(format!("{} ({}:{}): {}", peer.name, host, port, e)))?;

        connections.insert(peer.name.clone(), client.clone());
        Ok(client)
    }

    /// Drop a connection after a failure so the next call starts clean.
    async fn evict(&self, peer: &PeerRef) {
        let removed = self.connections.lock().await.remove(&peer.name);
        if let Some(client) = removed
            && let Err(e) = client.quit().await
        {
            debug!(peer = %peer.name, error = %e, "Error closing failed connection");
        }
    }

    /// Close every cached connection.
    pub async fn close(&self) {
        let drained: Vec<(String, Client)> = self.connections.lock().await.drain().collect();
        for (name, client) in drained {
            if let Err(e) = client.quit().await {
                warn!(peer = %name, error = %e, "Error closing connection");
            }
        }
    }

    /// Get the raw `CLUSTER NODES` text from a peer.
    #[instrument(skip(self, peer), fields(peer = %peer.name))]
    pub async fn cluster_nodes_raw(&self, peer: &PeerRef) -> Result<String, PeerError> {
        let client = self.connection(peer).await?;
        let result: Result<String, _> = client.cluster_nodes().await;
        match result {
            Ok(raw) => Ok(raw),
            Err(e) => {
                self.evict(peer).await;
                Err(e.into())
            }
        }
    }

    /// Get the parsed membership table of a peer.
    pub async fn cluster_nodes(&self, peer: &PeerRef) -> Result<MembershipSnapshot, PeerError> {
        let raw = self.cluster_nodes_raw(peer).await?;
        let snapshot = MembershipSnapshot::parse(&raw)?;
        Ok(snapshot)
    }

    /// Execute CLUSTER FORGET on a peer.
    #[instrument(skip(self, peer), fields(peer = %peer.name))]
    pub async fn cluster_forget(&self, peer: &PeerRef, node_id: &str) -> Result<(), PeerError> {
        let client = self.connection(peer).await?;
        if let Err(e) = client.cluster_forget(node_id).await {
            self.evict(peer).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Execute CLUSTER MEET on a peer.
    #[instrument(skip(self, peer), fields(peer = %peer.name))]
    pub async fn cluster_meet(&self, peer: &PeerRef, ip: &str, port: u16) -> Result<(), PeerError> {
        let client = self.connection(peer).await?;
        if let Err(e) = client.cluster_meet(ip, port).await {
            self.evict(peer).await;
            return Err(e.into());
        }
        Ok(())
    }
}
