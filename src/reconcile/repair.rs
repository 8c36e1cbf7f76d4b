//! Repair engine.
//!
//! For one peer: forget every node the peer knows at an address that no
//! longer belongs to any live peer, then MEET every live peer. Forgets always
//! run before meets so a stale identity is gone before a new node at a
//! recycled address is introduced.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{MembershipSnapshot, PeerProtocol};
use crate::directory::PeerRef;
use crate::error::Error;

/// One mutating command against a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RepairCommand {
    /// `CLUSTER FORGET <node_id>`; `address` is the stale address it was seen at.
    Forget { node_id: String, address: String },
    /// `CLUSTER MEET <address> <port>`.
    Meet { address: String, port: u16 },
}

impl std::fmt::Display for RepairCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairCommand::Forget { node_id, .. } => write!(f, "CLUSTER FORGET {}", node_id),
            RepairCommand::Meet { address, port } => write!(f, "CLUSTER MEET {} {}", address, port),
        }
    }
}

/// Ordered commands for one peer: all forgets, then all meets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub forgets: Vec<RepairCommand>,
    pub meets: Vec<RepairCommand>,
}

impl RepairPlan {
    /// Every command in execution order.
    pub fn commands(&self) -> impl Iterator<Item = &RepairCommand> {
        self.forgets.iter().chain(self.meets.iter())
    }
}

/// Work out what to send to a peer given its current table.
///
/// Address membership is the only forget criterion: a node at a live address
/// is kept even if its id is unexpected, and the peer's own entry is never
/// forgotten.
pub fn plan_repair(snapshot: &MembershipSnapshot, current_peers: &[PeerRef], port: u16) -> RepairPlan {
    let live: BTreeSet<&str> = current_peers.iter().map(|p| p.address.as_str()).collect();

    let forgets = snapshot
        .entries()
        .iter()
        .filter(|entry| !entry.is_myself() && !live.contains(entry.address.as_str()))
        .map(|entry| RepairCommand::Forget {
            node_id: entry.node_id.clone(),
            address: entry.address.clone(),
        })
        .collect();

    let meets = current_peers
        .iter()
        .map(|p| RepairCommand::Meet {
            address: p.address.clone(),
            port,
        })
        .collect();

    RepairPlan { forgets, meets }
}

/// What happened on one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub peer_name: String,
    /// Forgets attempted (or planned, in dry-run), successful or not.
    pub forgotten_count: usize,
    /// Meets attempted (or planned, in dry-run).
    pub introduced_count: usize,
    /// One message per failed command.
    pub failures: Vec<String>,
    /// Set when the peer's table could not be read and nothing was sent.
    pub skipped: Option<String>,
    pub dry_run: bool,
}

impl RepairOutcome {
    fn new(peer: &PeerRef, dry_run: bool) -> Self {
        Self {
            peer_name: peer.name.clone(),
            dry_run,
            ..Default::default()
        }
    }

    pub fn failed_commands(&self) -> usize {
        self.failures.len()
    }
}

/// Applies [`RepairPlan`]s to peers.
#[derive(Debug, Clone, Copy)]
pub struct RepairEngine {
    port: u16,
    dry_run: bool,
}

impl RepairEngine {
    pub fn new(port: u16, dry_run: bool) -> Self {
        Self { port, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Repair one peer's membership table.
    ///
    /// Command failures are logged and recorded, never propagated: one bad
    /// FORGET must not stop the remaining commands.
    pub async fn repair_peer<P: PeerProtocol>(
        &self,
        protocol: &P,
        peer: &PeerRef,
        current_peers: &[PeerRef],
    ) -> RepairOutcome {
        let mut outcome = RepairOutcome::new(peer, self.dry_run);

        let snapshot = match protocol.read_snapshot(peer).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = Error::unreachable(peer, &e);
                warn!(peer = %peer.name, error = %err, "Skipping repair, cannot read membership table");
                outcome.skipped = Some(err.to_string());
                return outcome;
            }
        };

        let plan = plan_repair(&snapshot, current_peers, self.port);
        info!(
            peer = %peer.name,
            forgets = plan.forgets.len(),
            meets = plan.meets.len(),
            dry_run = self.dry_run,
            "Repairing peer"
        );

        for command in plan.commands() {
            match command {
                RepairCommand::Forget { address, .. } => {
                    outcome.forgotten_count += 1;
                    debug!(peer = %peer.name, stale_address = %address, "Forgetting stale node");
                }
                RepairCommand::Meet { .. } => outcome.introduced_count += 1,
            }

            if self.dry_run {
                info!(peer = %peer.name, command = %command, "Dry run: would send");
                continue;
            }

            let result = match command {
                RepairCommand::Forget { node_id, .. } => protocol.forget_node(peer, node_id).await,
                RepairCommand::Meet { address, port } => {
                    protocol.meet_node(peer, address, *port).await
                }
            };

            if let Err(e) = result {
                let err = Error::command(peer, command.to_string(), &e);
                warn!(error = %err, "Repair command failed");
                outcome.failures.push(err.to_string());
            }
        }

        outcome
    }

    /// Repair every peer, one at a time, in ordinal order.
    pub async fn repair_all<P: PeerProtocol>(
        &self,
        protocol: &P,
        peers: &[PeerRef],
    ) -> Vec<RepairOutcome> {
        let mut outcomes = Vec::with_capacity(peers.len());
        for peer in peers {
            outcomes.push(self.repair_peer(protocol, peer, peers).await);
        }
        outcomes
    }
}
