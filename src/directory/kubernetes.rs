//! Kubernetes-backed peer directory.

use std::future::Future;

use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::{debug, info, instrument, warn};

use super::pods::{CredentialSource, credential_source, peers_from_pods};
use super::{PeerDirectory, PeerRef};
use crate::config::DirectorySettings;
use crate::error::Error;

/// Resolves peers and credentials through the Kubernetes API.
///
/// All queries are read-only: list pods, get pod, get secret.
#[derive(Clone)]
pub struct KubePeerDirectory {
    client: Client,
    settings: DirectorySettings,
}

impl KubePeerDirectory {
    pub fn new(client: Client, settings: DirectorySettings) -> Self {
        Self { client, settings }
    }

    /// Get the directory settings.
    pub fn settings(&self) -> &DirectorySettings {
        &self.settings
    }

    /// Get the Kubernetes client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.settings.namespace)
    }

    #[instrument(skip(self), fields(namespace = %self.settings.namespace, prefix = %self.settings.pod_prefix))]
    async fn list_and_resolve(&self) -> Result<Vec<PeerRef>, Error> {
        let pods = self
            .pods()
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Resolution(format!("Failed to list pods: {}", e)))?;

        debug!(pods = pods.items.len(), "Listed pods");

        let peers = peers_from_pods(&pods.items, &self.settings.pod_prefix, self.settings.num_pods)?;

        info!(
            peers = peers.len(),
            auto_detected = self.settings.num_pods.is_none(),
            "Resolved peer set"
        );
        for peer in &peers {
            debug!(ordinal = peer.ordinal, name = %peer.name, address = %peer.address, "Peer");
        }

        Ok(peers)
    }

    #[instrument(skip(self, peer), fields(peer = %peer.name))]
    async fn credential_from_pod(&self, peer: &PeerRef) -> Result<Option<String>, Error> {
        if !self.settings.auth {
            debug!("Authentication disabled, skipping credential lookup");
            return Ok(None);
        }

        let pod = match self.pods().get(&peer.name).await {
            Ok(pod) => pod,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                return Err(Error::Resolution(format!("Pod {} not found", peer.name)));
            }
            Err(e) => return Err(e.into()),
        };

        let var = &self.settings.password_env;
        match credential_source(&pod, self.settings.container.as_deref(), var) {
            CredentialSource::Literal(value) => {
                debug!(var = %var, "Credential found as literal env value");
                Ok(Some(value))
            }
            CredentialSource::SecretRef { name, key } => {
                debug!(var = %var, secret = %name, key = %key, "Credential sourced from secret");
                self.secret_value(&name, &key).await.map(Some)
            }
            CredentialSource::Absent => Err(Error::Credential(format!(
                "{} not set in environment of pod {}",
                var, peer.name
            ))),
        }
    }

    /// Read one key of a secret.
    async fn secret_value(&self, secret_name: &str, secret_key: &str) -> Result<String, Error> {
        let secret_api: Api<Secret> =
            Api::namespaced(self.client.clone(), &self.settings.namespace);

        let secret = match secret_api.get(secret_name).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                warn!(secret = %secret_name, "Credential secret not found");
                return Err(Error::Credential(format!(
                    "Secret {} not found",
                    secret_name
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = secret
            .data
            .as_ref()
            .and_then(|data| data.get(secret_key))
            .ok_or_else(|| {
                Error::Credential(format!(
                    "Key {} not found in secret {}",
                    secret_key, secret_name
                ))
            })?;

        let value = String::from_utf8(bytes.0.clone())
            .map_err(|e| Error::Credential(format!("Invalid credential encoding: {}", e)))?;

        if value.is_empty() {
            return Err(Error::Credential(format!(
                "Key {} in secret {} is empty",
                secret_key, secret_name
            )));
        }

        Ok(value)
    }
}

impl PeerDirectory for KubePeerDirectory {
    fn resolve_peers(&self) -> impl Future<Output = Result<Vec<PeerRef>, Error>> + Send {
        self.list_and_resolve()
    }

    fn resolve_credential(
        &self,
        peer: &PeerRef,
    ) -> impl Future<Output = Result<Option<String>, Error>> + Send {
        self.credential_from_pod(peer)
    }
}
