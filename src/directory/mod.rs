//! Peer directory: which peers should exist and where they currently live.
//!
//! Peers are StatefulSet pods named `<prefix>-<ordinal>`. The name and
//! ordinal are stable; the address is the pod IP and changes on restart.

pub mod kubernetes;
pub mod pods;

use std::future::Future;

use serde::Serialize;

use crate::error::Error;

pub use kubernetes::KubePeerDirectory;
pub use pods::{CredentialSource, credential_source, peer_ordinal, peers_from_pods};

/// One expected peer as resolved from the orchestration platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeerRef {
    /// StatefulSet ordinal.
    pub ordinal: u32,
    /// Pod name (`<prefix>-<ordinal>`).
    pub name: String,
    /// Current pod IP.
    pub address: String,
}

impl PeerRef {
    pub fn new(ordinal: u32, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for PeerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Source of the expected peer set and the shared cluster credential.
pub trait PeerDirectory {
    /// Resolve every expected peer, ordered by ordinal.
    ///
    /// Fails with [`Error::Resolution`] when no peers match or any expected
    /// peer has no address yet.
    fn resolve_peers(&self) -> impl Future<Output = Result<Vec<PeerRef>, Error>> + Send;

    /// Resolve the shared credential from the given peer's environment.
    ///
    /// Returns `Ok(None)` only when authentication is disabled; a missing
    /// credential otherwise fails with [`Error::Credential`].
    fn resolve_credential(
        &self,
        peer: &PeerRef,
    ) -> impl Future<Output = Result<Option<String>, Error>> + Send;
}
