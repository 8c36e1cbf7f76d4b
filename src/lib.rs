//! redis-cluster-reconciler library crate
//!
//! Detects and repairs stale node addresses in a Redis Cluster running as a
//! Kubernetes StatefulSet, then verifies the cluster converged.

pub mod cli;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod reconcile;
pub mod report;
pub mod transport;

pub use config::{DirectorySettings, ReconcilerConfig, Settings};
pub use error::{Error, Result};
pub use reconcile::{Reconciler, RunOutcome, RunSummary};

use kube::Client;
use tracing::info;

use client::RedisPeerClient;
use directory::{KubePeerDirectory, PeerDirectory};
use transport::{ConnectionStrategy, PeerPortForwards};

/// Resolve peers and credential from Kubernetes, then run one reconciliation.
///
/// Directory failures (no pods, missing IP, missing credential) are returned
/// as errors; everything after that is reported in the [`RunSummary`].
pub async fn run(client: Client, settings: &Settings) -> Result<RunSummary> {
    settings.validate()?;
    let directory = KubePeerDirectory::new(client.clone(), settings.directory.clone());

    let peers = directory.resolve_peers().await?;
    let Some(reference) = peers.first() else {
        return Err(Error::Resolution("No peers resolved".to_string()));
    };

    let password = directory.resolve_credential(reference).await?;

    let strategy = if settings.port_forward {
        let forwards = PeerPortForwards::start(
            client,
            &settings.directory.namespace,
            &peers,
            settings.reconciler.port,
        )
        .await?;
        ConnectionStrategy::PortForward(forwards)
    } else {
        ConnectionStrategy::direct(settings.reconciler.port)
    };

    let peer_client = RedisPeerClient::new(settings.client.clone().with_password(password), strategy);
    info!(client = %peer_client.config(), port_forward = settings.port_forward, "Peer client ready");

    let reconciler = Reconciler::new(peer_client, settings.reconciler.clone());
    let summary = reconciler.run(&peers).await;
    reconciler.protocol().close().await;

    summary
}
