//! Error types for reconciliation runs.
//!
//! Defines the error taxonomy with classification for fatal vs per-peer
//! failures.

use thiserror::Error;

use crate::client::PeerError;
use crate::directory::PeerRef;
use crate::transport::PortForwardError;

/// Error type for reconciliation operations
#[derive(Error, Debug)]
pub enum Error {
    /// Expected peers or their addresses could not be enumerated
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The shared credential could not be found
    #[error("Credential error: {0}")]
    Credential(String),

    /// A peer could not be queried
    #[error("Peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    /// A single repair command failed
    #[error("{command} failed on {peer}: {reason}")]
    Command {
        peer: String,
        command: String,
        reason: String,
    },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Port-forward setup failed
    #[error("Port forward error: {0}")]
    PortForward(#[from] PortForwardError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::Unreachable`] from a failed peer read.
    pub fn unreachable(peer: &PeerRef, err: &PeerError) -> Self {
        Error::Unreachable {
            peer: peer.name.clone(),
            reason: err.to_string(),
        }
    }

    /// Build an [`Error::Command`] from a failed FORGET or MEET.
    pub fn command(peer: &PeerRef, command: impl Into<String>, err: &PeerError) -> Self {
        Error::Command {
            peer: peer.name.clone(),
            command: command.into(),
            reason: err.to_string(),
        }
    }

    /// Check if this error should abort the run
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Resolution(_)
            | Error::Credential(_)
            | Error::Kube(_)
            | Error::PortForward(_)
            | Error::Config(_) => true,
            Error::Unreachable { .. } | Error::Command { .. } => false,
        }
    }
}

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
