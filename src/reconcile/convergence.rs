//! Convergence waiter.
//!
//! After repair the cluster bus needs time to gossip the new addresses. The
//! waiter polls the reference peer until it sees every expected peer
//! connected and nothing in fail or handshake. A timeout is advisory: the
//! caller runs its final check regardless.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::retry::{RetryPolicy, retry_until};
use crate::client::{MembershipSnapshot, PeerProtocol};
use crate::directory::PeerRef;

/// Link counts seen in one poll of the reference peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkCounts {
    pub connected: usize,
    pub failing: usize,
}

impl LinkCounts {
    pub fn of(snapshot: &MembershipSnapshot) -> Self {
        Self {
            connected: snapshot.connected_count(),
            failing: snapshot.failing_count(),
        }
    }

    pub fn is_converged(&self, expected: usize) -> bool {
        self.connected == expected && self.failing == 0
    }
}

/// Result of a convergence wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvergenceOutcome {
    pub converged: bool,
    pub expected: usize,
    /// Counts from the last successful poll; `None` if every poll failed.
    pub last_counts: Option<LinkCounts>,
    pub polls: u32,
    pub elapsed: Duration,
}

impl ConvergenceOutcome {
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.as_secs()
    }
}

/// Poll `reference` until `expected` peers are connected and none are
/// failing, or `max_wait` elapses.
pub async fn wait_for_convergence<P: PeerProtocol>(
    protocol: &P,
    reference: &PeerRef,
    expected: usize,
    max_wait: Duration,
    poll_interval: Duration,
) -> ConvergenceOutcome {
    info!(
        peer = %reference.name,
        expected = expected,
        max_wait_secs = max_wait.as_secs(),
        "Waiting for cluster convergence"
    );

    let outcome = retry_until(
        RetryPolicy::new(poll_interval, max_wait),
        move || async move {
            let snapshot = protocol.read_snapshot(reference).await?;
            let counts = LinkCounts::of(&snapshot);
            debug!(
                connected = counts.connected,
                failing = counts.failing,
                expected = expected,
                "Convergence poll"
            );
            Ok::<_, crate::client::PeerError>(counts)
        },
        |counts| counts.is_converged(expected),
    )
    .await;

    let result = ConvergenceOutcome {
        converged: outcome.satisfied,
        expected,
        last_counts: outcome.last,
        polls: outcome.attempts,
        elapsed: outcome.elapsed,
    };

    if result.converged {
        info!(elapsed_secs = result.elapsed_seconds(), polls = result.polls, "Cluster converged");
    } else {
        warn!(
            elapsed_secs = result.elapsed_seconds(),
            polls = result.polls,
            connected = ?result.last_counts.map(|c| c.connected),
            failing = ?result.last_counts.map(|c| c.failing),
            "Convergence wait timed out, continuing to final check"
        );
    }

    result
}
