//! How the client reaches each peer.
//!
//! Peer addresses in membership tables are always pod IPs. Where the client
//! actually connects depends on where the reconciler runs: in-cluster it
//! dials pod IPs directly, from a workstation it goes through port-forwards.

pub mod port_forward;

pub use port_forward::{PeerPortForwards, PortForward, PortForwardError};

use crate::directory::PeerRef;

/// Connection strategy for reaching peers.
pub enum ConnectionStrategy {
    /// Dial `peer.address:port`.
    Direct { port: u16 },
    /// Dial the local end of a per-peer port-forward.
    PortForward(PeerPortForwards),
}

impl ConnectionStrategy {
    /// Dial pod IPs on `port`.
    pub fn direct(port: u16) -> Self {
        Self::Direct { port }
    }

    /// Host and port to connect to for `peer`.
    ///
    /// `None` when port-forwarding is in use and the peer has no forward.
    pub fn endpoint_for(&self, peer: &PeerRef) -> Option<(String, u16)> {
        match self {
            Self::Direct { port } => Some((peer.address.clone(), *port)),
            Self::PortForward(forwards) => forwards.local_address(&peer.name),
        }
    }
}
