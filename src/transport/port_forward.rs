//! Port forwarding to peer pods.
//!
//! Used when the reconciler runs outside the cluster network and pod IPs are
//! not routable. Each peer gets a local listener on `127.0.0.1` whose
//! connections are tunnelled to the pod's Redis port through the Kubernetes
//! API. Dropping a [`PortForward`] stops its listener.

use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::directory::PeerRef;

/// Errors that can occur during port forwarding
#[derive(Error, Debug)]
pub enum PortForwardError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Port {port} not available on pod {pod}")]
    StreamUnavailable { pod: String, port: u16 },

    #[error("Port forward join error: {0}")]
    JoinError(String),
}

/// A running port-forward from a local port to one pod.
pub struct PortForward {
    pod_name: String,
    local_port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _handle: JoinHandle<()>,
}

impl PortForward {
    /// Start forwarding an ephemeral local port to `pod_name:remote_port`.
    ///
    /// The listener is bound before this returns, so the local port accepts
    /// connections immediately.
    pub async fn start(
        client: Client,
        namespace: &str,
        pod_name: &str,
        remote_port: u16,
    ) -> Result<Self, PortForwardError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_port = listener.local_addr()?.port();

        let pods: Api<Pod> = Api::namespaced(client, namespace);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let pod = pod_name.to_string();
        let handle = tokio::spawn(async move {
            accept_loop(listener, pods, pod, remote_port, shutdown_rx).await;
        });

        tracing::debug!(
            namespace = namespace,
            pod = %pod_name,
            local_port = local_port,
            remote_port = remote_port,
            "Port-forward established"
        );

        Ok(Self {
            pod_name: pod_name.to_string(),
            local_port,
            shutdown_tx: Some(shutdown_tx),
            _handle: handle,
        })
    }

    /// Get the local port that is forwarding to the pod
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Get the forwarded pod's name
    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }

    /// Stop the port-forward. Calling this more than once is a no-op.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            tracing::debug!(local_port = self.local_port, pod = %self.pod_name, "Stopping port-forward");
            let _ = tx.send(());
        }
    }
}

impl Drop for PortForward {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    pods: Api<Pod>,
    pod_name: String,
    remote_port: u16,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                tracing::trace!(pod = %pod_name, "Port forward shutdown requested");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        tracing::trace!(client_addr = %addr, pod = %pod_name, "New port forward connection");
                        let pods = pods.clone();
                        let pod_name = pod_name.clone();
                        tokio::spawn(async move {
                            if let Err(e) = tunnel(pods, &pod_name, remote_port, stream).await {
                                tracing::warn!(pod = %pod_name, error = %e, "Port forward connection error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(pod = %pod_name, error = %e, "Port forward accept error");
                    }
                }
            }
        }
    }
}

/// Tunnel one local connection to the pod.
async fn tunnel(
    pods: Api<Pod>,
    pod_name: &str,
    remote_port: u16,
    mut local: TcpStream,
) -> Result<(), PortForwardError> {
    let mut forwarder = pods.portforward(pod_name, &[remote_port]).await?;

    let mut upstream = forwarder
        .take_stream(remote_port)
        .ok_or_else(|| PortForwardError::StreamUnavailable {
            pod: pod_name.to_string(),
            port: remote_port,
        })?;

    tokio::io::copy_bidirectional(&mut local, &mut upstream).await?;
    // The forwarder only finishes once its streams are gone.
    drop(upstream);

    forwarder
        .join()
        .await
        .map_err(|e| PortForwardError::JoinError(e.to_string()))?;

    Ok(())
}

/// Port forwards for a whole peer set, keyed by pod name.
pub struct PeerPortForwards {
    forwards: Vec<PortForward>,
}

impl PeerPortForwards {
    /// Start one forward per peer, in ordinal order.
    pub async fn start(
        client: Client,
        namespace: &str,
        peers: &[PeerRef],
        remote_port: u16,
    ) -> Result<Self, PortForwardError> {
        let mut forwards = Vec::with_capacity(peers.len());
        for peer in peers {
            let pf = PortForward::start(client.clone(), namespace, &peer.name, remote_port).await?;
            forwards.push(pf);
        }

        tracing::info!(forwards = forwards.len(), "Port-forwards ready");
        Ok(Self { forwards })
    }

    /// Local address for a pod, if it is forwarded.
    pub fn local_address(&self, pod_name: &str) -> Option<(String, u16)> {
        self.forwards
            .iter()
            .find(|pf| pf.pod_name() == pod_name)
            .map(|pf| ("127.0.0.1".to_string(), pf.local_port()))
    }

    pub fn len(&self) -> usize {
        self.forwards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwards.is_empty()
    }
}
