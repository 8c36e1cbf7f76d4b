//! Consistency checker.
//!
//! Compares each peer's membership table against the reference snapshot
//! (peer 0). The comparison is one-directional: every node the reference
//! knows must appear in the peer's table at the same address, but nodes only
//! the peer knows about are not reported.

use serde::Serialize;
use tracing::{info, warn};

use crate::client::{MembershipSnapshot, PeerProtocol};
use crate::directory::PeerRef;
use crate::error::Error;

/// What is wrong with one (peer, node) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscrepancyKind {
    /// The peer does not know a node the reference knows.
    Missing,
    /// The peer knows the node at a different address.
    AddressMismatch,
    /// The peer's table could not be read at all.
    Unreachable,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyKind::Missing => write!(f, "missing"),
            DiscrepancyKind::AddressMismatch => write!(f, "address mismatch"),
            DiscrepancyKind::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// One finding of the checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub peer_name: String,
    /// `None` for whole-peer findings.
    pub node_id: Option<String>,
    pub kind: DiscrepancyKind,
    pub expected_address: Option<String>,
    pub actual_address: Option<String>,
    /// Failure reason for unreachable peers.
    pub detail: Option<String>,
}

impl Discrepancy {
    pub fn missing(peer_name: &str, node_id: &str, expected: &str) -> Self {
        Self {
            peer_name: peer_name.to_string(),
            node_id: Some(node_id.to_string()),
            kind: DiscrepancyKind::Missing,
            expected_address: Some(expected.to_string()),
            actual_address: None,
            detail: None,
        }
    }

    pub fn address_mismatch(peer_name: &str, node_id: &str, expected: &str, actual: &str) -> Self {
        Self {
            peer_name: peer_name.to_string(),
            node_id: Some(node_id.to_string()),
            kind: DiscrepancyKind::AddressMismatch,
            expected_address: Some(expected.to_string()),
            actual_address: Some(actual.to_string()),
            detail: None,
        }
    }

    pub fn unreachable(peer_name: &str, reason: impl Into<String>) -> Self {
        Self {
            peer_name: peer_name.to_string(),
            node_id: None,
            kind: DiscrepancyKind::Unreachable,
            expected_address: None,
            actual_address: None,
            detail: Some(reason.into()),
        }
    }
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.node_id.as_deref().unwrap_or("-");
        let expected = self.expected_address.as_deref().unwrap_or("-");
        let actual = self.actual_address.as_deref().unwrap_or("-");
        match self.kind {
            DiscrepancyKind::Missing => {
                write!(f, "{}: node {} missing (expected at {})", self.peer_name, node, expected)
            }
            DiscrepancyKind::AddressMismatch => write!(
                f,
                "{}: node {} at {}, reference says {}",
                self.peer_name, node, actual, expected
            ),
            DiscrepancyKind::Unreachable => write!(
                f,
                "{}: unreachable ({})",
                self.peer_name,
                self.detail.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Result of one check pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Peers whose table was read or attempted, in ordinal order.
    pub checked_peers: Vec<String>,
    pub discrepancies: Vec<Discrepancy>,
}

impl ConsistencyReport {
    /// Healthy means no discrepancies of any kind, unreachable peers included.
    pub fn is_healthy(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Number of peers compared (including unreachable ones).
    pub fn peers_checked(&self) -> usize {
        self.checked_peers.len()
    }

    /// Whether this pass looked at `peer_name` at all.
    pub fn was_checked(&self, peer_name: &str) -> bool {
        self.checked_peers.iter().any(|p| p == peer_name)
    }

    /// Findings for one peer.
    pub fn for_peer<'a>(&'a self, peer_name: &'a str) -> impl Iterator<Item = &'a Discrepancy> {
        self.discrepancies
            .iter()
            .filter(move |d| d.peer_name == peer_name)
    }

    /// Number of findings of a given kind.
    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }

    /// Report for a run where the reference itself could not be read.
    ///
    /// No other peer is compared.
    pub fn reference_unreachable(peer: &PeerRef, reason: impl Into<String>) -> Self {
        Self {
            checked_peers: vec![peer.name.clone()],
            discrepancies: vec![Discrepancy::unreachable(&peer.name, reason)],
        }
    }
}

/// Compare one peer's snapshot against the reference.
pub fn compare(
    reference: &MembershipSnapshot,
    peer_name: &str,
    snapshot: &MembershipSnapshot,
) -> Vec<Discrepancy> {
    reference
        .entries()
        .iter()
        .filter_map(|expected| match snapshot.get(&expected.node_id) {
            None => Some(Discrepancy::missing(
                peer_name,
                &expected.node_id,
                &expected.address,
            )),
            Some(actual) if actual.address != expected.address => {
                Some(Discrepancy::address_mismatch(
                    peer_name,
                    &expected.node_id,
                    &expected.address,
                    &actual.address,
                ))
            }
            Some(_) => None,
        })
        .collect()
}

/// Build a report from already-read snapshots.
///
/// A failed read contributes a single whole-peer discrepancy.
pub fn check<'a, I>(reference: &MembershipSnapshot, reads: I) -> ConsistencyReport
where
    I: IntoIterator<Item = (&'a PeerRef, &'a Result<MembershipSnapshot, String>)>,
{
    let mut report = ConsistencyReport::default();

    for (peer, read) in reads {
        report.checked_peers.push(peer.name.clone());
        match read {
            Ok(snapshot) => report
                .discrepancies
                .extend(compare(reference, &peer.name, snapshot)),
            Err(reason) => report
                .discrepancies
                .push(Discrepancy::unreachable(&peer.name, reason.clone())),
        }
    }

    report
}

/// Read every peer's table, in ordinal order, and compare it to `reference`.
pub async fn check_peers<P: PeerProtocol>(
    protocol: &P,
    reference: &MembershipSnapshot,
    peers: &[PeerRef],
) -> ConsistencyReport {
    let mut reads = Vec::with_capacity(peers.len());

    for peer in peers {
        let read = protocol
            .read_snapshot(peer)
            .await
            .map_err(|e| Error::unreachable(peer, &e).to_string());
        reads.push((peer, read));
    }

    let report = check(reference, reads.iter().map(|(p, r)| (*p, r)));

    for (peer, read) in &reads {
        let found = report.for_peer(&peer.name).count();
        match read {
            Err(reason) => warn!(peer = %peer.name, reason = %reason, "Peer unreachable"),
            Ok(_) if found == 0 => info!(peer = %peer.name, "Peer consistent with reference"),
            Ok(_) => warn!(peer = %peer.name, discrepancies = found, "Peer inconsistent with reference"),
        }
    }

    report
}
