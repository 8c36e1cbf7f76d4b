//! The reconciliation cycle: check, repair, wait, re-check.
//!
//! [`Reconciler`] is parameterized by [`ReconcilerConfig`]. With
//! `skip_if_healthy` a clean initial check ends the run; without it the
//! repair pass always runs (MEET is idempotent, so refreshing a healthy
//! cluster is harmless).

pub mod checker;
pub mod convergence;
pub mod repair;
pub mod retry;

use jiff::Timestamp;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::client::{MembershipSnapshot, PeerProtocol};
use crate::config::ReconcilerConfig;
use crate::directory::PeerRef;
use crate::error::{Error, Result};

pub use checker::{ConsistencyReport, Discrepancy, DiscrepancyKind};
pub use convergence::{ConvergenceOutcome, LinkCounts, wait_for_convergence};
pub use repair::{RepairCommand, RepairEngine, RepairOutcome, RepairPlan, plan_repair};
pub use retry::{RetryOutcome, RetryPolicy, retry_until};

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// The cluster was clean and nothing was sent (early exit or dry run).
    AlreadyHealthy,
    /// Repair ran and the final check is clean.
    Repaired,
    /// The final check still found discrepancies.
    StillInconsistent,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::AlreadyHealthy | RunOutcome::Repaired)
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::AlreadyHealthy => write!(f, "already healthy"),
            RunOutcome::Repaired => write!(f, "repaired"),
            RunOutcome::StillInconsistent => write!(f, "still inconsistent"),
        }
    }
}

/// Everything observed during one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub dry_run: bool,
    pub peers: Vec<PeerRef>,
    pub initial: ConsistencyReport,
    pub repairs: Vec<RepairOutcome>,
    /// `None` when the run stopped early or in dry-run.
    pub convergence: Option<ConvergenceOutcome>,
    /// `None` when the run stopped after the initial check.
    pub final_report: Option<ConsistencyReport>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    /// Total forgets attempted across all peers.
    pub fn total_forgotten(&self) -> usize {
        self.repairs.iter().map(|r| r.forgotten_count).sum()
    }

    /// Total failed repair commands across all peers.
    pub fn total_failed_commands(&self) -> usize {
        self.repairs.iter().map(|r| r.failed_commands()).sum()
    }
}

/// Runs the check/repair/wait/re-check cycle against one peer set.
pub struct Reconciler<P> {
    protocol: P,
    config: ReconcilerConfig,
}

impl<P: PeerProtocol + Sync> Reconciler<P> {
    pub fn new(protocol: P, config: ReconcilerConfig) -> Self {
        Self { protocol, config }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Read peer 0's table, the ground truth for every check.
    ///
    /// Without it nothing can be compared, so failure is a resolution error.
    pub async fn reference_snapshot(&self, reference_peer: &PeerRef) -> Result<MembershipSnapshot> {
        self.protocol
            .read_snapshot(reference_peer)
            .await
            .map_err(|e| {
                Error::Resolution(format!(
                    "Reference peer {} unreadable: {}",
                    reference_peer.name, e
                ))
            })
    }

    /// Check every peer against a fresh read of peer 0's table.
    ///
    /// If peer 0 cannot be read there is no reference; the report then holds
    /// a single unreachable finding for it.
    pub async fn verify(&self, peers: &[PeerRef]) -> ConsistencyReport {
        let Some(reference_peer) = peers.first() else {
            return ConsistencyReport::default();
        };

        match self.protocol.read_snapshot(reference_peer).await {
            Ok(reference) => checker::check_peers(&self.protocol, &reference, peers).await,
            Err(e) => {
                let err = Error::unreachable(reference_peer, &e);
                error!(error = %err, "Reference peer unreachable");
                ConsistencyReport::reference_unreachable(reference_peer, err.to_string())
            }
        }
    }

    /// Run one full reconciliation.
    ///
    /// An empty peer set or an unreadable reference on the initial check is
    /// an error; everything per-peer ends up in the summary.
    #[instrument(skip_all, fields(peers = peers.len(), dry_run = self.config.dry_run))]
    pub async fn run(&self, peers: &[PeerRef]) -> Result<RunSummary> {
        let started_at = Timestamp::now();
        let Some(reference_peer) = peers.first() else {
            return Err(Error::Resolution("No peers to reconcile".to_string()));
        };

        info!("Checking membership consistency");
        let reference = self.reference_snapshot(reference_peer).await?;
        info!(
            peer = %reference_peer.name,
            nodes = reference.len(),
            "Reference snapshot taken"
        );
        let initial = checker::check_peers(&self.protocol, &reference, peers).await;

        if initial.is_healthy() && self.config.skip_if_healthy {
            info!("All peers consistent, nothing to repair");
            return Ok(RunSummary {
                started_at,
                finished_at: Timestamp::now(),
                dry_run: self.config.dry_run,
                peers: peers.to_vec(),
                initial,
                repairs: Vec::new(),
                convergence: None,
                final_report: None,
                outcome: RunOutcome::AlreadyHealthy,
            });
        }

        if initial.is_healthy() {
            info!("All peers consistent, refreshing membership anyway");
        } else {
            warn!(
                discrepancies = initial.discrepancies.len(),
                "Inconsistent membership, starting repair"
            );
        }

        let engine = RepairEngine::new(self.config.port, self.config.dry_run);
        let repairs = engine.repair_all(&self.protocol, peers).await;

        let convergence = if self.config.dry_run {
            info!("Dry run: skipping convergence wait");
            None
        } else {
            Some(
                wait_for_convergence(
                    &self.protocol,
                    reference_peer,
                    peers.len(),
                    self.config.max_wait,
                    self.config.poll_interval,
                )
                .await,
            )
        };

        info!("Re-checking membership consistency");
        let final_report = self.verify(peers).await;

        // A dry run sends nothing, so a clean re-check means it was already clean.
        let outcome = if !final_report.is_healthy() {
            RunOutcome::StillInconsistent
        } else if self.config.dry_run {
            RunOutcome::AlreadyHealthy
        } else {
            RunOutcome::Repaired
        };
        info!(outcome = %outcome, "Reconciliation finished");

        Ok(RunSummary {
            started_at,
            finished_at: Timestamp::now(),
            dry_run: self.config.dry_run,
            peers: peers.to_vec(),
            initial,
            repairs,
            convergence,
            final_report: Some(final_report),
            outcome,
        })
    }
}
