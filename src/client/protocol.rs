//! The data-plane operations the reconciler needs from a peer.
//!
//! Checker, repair engine and convergence waiter are generic over
//! [`PeerProtocol`]; production code uses [`RedisPeerClient`], tests use an
//! in-memory cluster.

use std::future::Future;

use super::redis_client::{PeerError, RedisPeerClient};
use super::types::MembershipSnapshot;
use crate::directory::PeerRef;

/// Membership commands issued against one peer.
///
/// Implementations are expected to authenticate with the shared cluster
/// credential they were built with.
pub trait PeerProtocol {
    /// `CLUSTER NODES`, parsed.
    fn read_snapshot(
        &self,
        peer: &PeerRef,
    ) -> impl Future<Output = Result<MembershipSnapshot, PeerError>> + Send;

    /// `CLUSTER FORGET <node_id>`.
    fn forget_node(
        &self,
        peer: &PeerRef,
        node_id: &str,
    ) -> impl Future<Output = Result<(), PeerError>> + Send;

    /// `CLUSTER MEET <address> <port>`.
    fn meet_node(
        &self,
        peer: &PeerRef,
        address: &str,
        port: u16,
    ) -> impl Future<Output = Result<(), PeerError>> + Send;
}

impl PeerProtocol for RedisPeerClient {
    fn read_snapshot(
        &self,
        peer: &PeerRef,
    ) -> impl Future<Output = Result<MembershipSnapshot, PeerError>> + Send {
        self.cluster_nodes(peer)
    }

    fn forget_node(
        &self,
        peer: &PeerRef,
        node_id: &str,
    ) -> impl Future<Output = Result<(), PeerError>> + Send {
        self.cluster_forget(peer, node_id)
    }

    fn meet_node(
        &self,
        peer: &PeerRef,
        address: &str,
        port: u16,
    ) -> impl Future<Output = Result<(), PeerError>> + Send {
        self.cluster_meet(peer, address, port)
    }
}
