//! Consistency checks against the in-memory cluster.

use redis_cluster_reconciler::Reconciler;
use redis_cluster_reconciler::reconcile::DiscrepancyKind;

use crate::common::*;

#[tokio::test]
async fn test_healthy_cluster_has_no_discrepancies() {
    let (cluster, peers) = healthy_three();
    let reconciler = Reconciler::new(cluster, test_config());

    let report = reconciler.verify(&peers).await;

    assert!(report.is_healthy());
    assert_eq!(report.peers_checked(), 3);
}

#[tokio::test]
async fn test_moved_peer_reported_as_address_mismatch() {
    let (cluster, peers) = moved_peer_cluster();
    let reconciler = Reconciler::new(cluster, test_config());

    let report = reconciler.verify(&peers).await;

    assert!(!report.is_healthy());
    // Peer 0 and 1 agree with the stale reference; only peer 2 disagrees.
    assert_eq!(report.for_peer("redis-cluster-0").count(), 0);
    assert_eq!(report.for_peer("redis-cluster-1").count(), 0);

    let findings: Vec<_> = report.for_peer("redis-cluster-2").collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, DiscrepancyKind::AddressMismatch);
    assert_eq!(findings[0].node_id.as_deref(), Some(NODE_IDS[2]));
    assert_eq!(findings[0].expected_address.as_deref(), Some("10.0.0.3"));
    assert_eq!(findings[0].actual_address.as_deref(), Some("10.0.0.9"));
}

#[tokio::test]
async fn test_missing_node_reported() {
    let (cluster, peers) = healthy_three();
    cluster.set_table(
        "redis-cluster-1",
        vec![
            FakeRow::new(NODE_IDS[0], "10.0.0.1"),
            FakeRow::myself(NODE_IDS[1], "10.0.0.2"),
        ],
    );
    let reconciler = Reconciler::new(cluster, test_config());

    let report = reconciler.verify(&peers).await;

    assert_eq!(report.count(DiscrepancyKind::Missing), 1);
    let finding = report.for_peer("redis-cluster-1").next().unwrap();
    assert_eq!(finding.node_id.as_deref(), Some(NODE_IDS[2]));
}

#[tokio::test]
async fn test_unreachable_peer_is_a_discrepancy() {
    let (cluster, peers) = healthy_three();
    cluster.set_unreachable("redis-cluster-1");
    let reconciler = Reconciler::new(cluster, test_config());

    let report = reconciler.verify(&peers).await;

    assert!(!report.is_healthy());
    assert_eq!(report.peers_checked(), 3);
    assert_eq!(report.count(DiscrepancyKind::Unreachable), 1);
    assert_eq!(
        report.for_peer("redis-cluster-1").next().unwrap().kind,
        DiscrepancyKind::Unreachable
    );
}

#[tokio::test]
async fn test_unreachable_reference_yields_single_finding() {
    let (cluster, peers) = healthy_three();
    cluster.set_unreachable("redis-cluster-0");
    let reconciler = Reconciler::new(cluster, test_config());

    let report = reconciler.verify(&peers).await;

    assert_eq!(report.discrepancies.len(), 1);
    assert_eq!(report.discrepancies[0].peer_name, "redis-cluster-0");
    assert_eq!(report.discrepancies[0].kind, DiscrepancyKind::Unreachable);
}

#[tokio::test]
async fn test_extra_entries_on_peer_are_ignored() {
    let (cluster, peers) = healthy_three();
    cluster.upsert_row(
        "redis-cluster-1",
        FakeRow::failed("ffffffffffffffffffffffffffffffffffffffff", "10.0.0.77"),
    );
    let reconciler = Reconciler::new(cluster, test_config());

    let report = reconciler.verify(&peers).await;

    assert!(report.is_healthy());
}

#[tokio::test]
async fn test_check_is_read_only() {
    let (cluster, peers) = moved_peer_cluster();
    let reconciler = Reconciler::new(cluster, test_config());

    reconciler.verify(&peers).await;

    assert_eq!(reconciler.protocol().mutation_count(), 0);
    // Reference plus every peer.
    assert_eq!(reconciler.protocol().query_count(), 4);
}
