// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for redis-cluster-reconciler.
//!
//! These tests run without a Kubernetes cluster or Redis and test individual
//! components in isolation.

#[path = "../common/mod.rs"]
mod common;

mod parsing_tests {
    use redis_cluster_reconciler::client::{LinkState, MembershipSnapshot, ParseError};

    use crate::common::cluster_nodes_text;

    #[test]
    fn test_parse_three_node_output() {
        let text = cluster_nodes_text(&[
            ("a", "10.0.0.1", "myself,master", "connected"),
            ("b", "10.0.0.2", "master", "connected"),
            ("c", "10.0.0.3", "master,fail", "disconnected"),
        ]);

        let snapshot = MembershipSnapshot::parse(&text).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.myself().unwrap().node_id, "a");
        assert_eq!(snapshot.get("c").unwrap().address, "10.0.0.3");
        assert_eq!(snapshot.get("c").unwrap().link_state, LinkState::Fail);
        assert_eq!(snapshot.connected_count(), 2);
        assert_eq!(snapshot.failing_count(), 1);
    }

    #[test]
    fn test_parse_real_redis_line() {
        let line = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001,hostname-1 \
                    slave 67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 0 1426238316232 1 connected";

        let snapshot = MembershipSnapshot::parse(line).unwrap();
        let entry = &snapshot.entries()[0];

        assert_eq!(entry.address, "127.0.0.1");
        assert_eq!(entry.port, 30001);
        assert!(entry.flags.contains("slave"));
        assert!(entry.is_connected());
    }

    #[test]
    fn test_pfail_and_handshake_are_failing() {
        let text = cluster_nodes_text(&[
            ("a", "10.0.0.1", "myself,master", "connected"),
            ("b", "10.0.0.2", "master,fail?", "connected"),
            ("c", "10.0.0.3", "handshake", "disconnected"),
        ]);

        let snapshot = MembershipSnapshot::parse(&text).unwrap();

        assert_eq!(snapshot.get("b").unwrap().link_state, LinkState::Fail);
        assert_eq!(snapshot.get("c").unwrap().link_state, LinkState::Handshake);
        assert_eq!(snapshot.connected_count(), 1);
        assert_eq!(snapshot.failing_count(), 2);
    }

    #[test]
    fn test_noaddr_entry() {
        let line = "d :0@0 master,noaddr - 0 0 0 disconnected";

        let snapshot = MembershipSnapshot::parse(line).unwrap();
        let entry = &snapshot.entries()[0];

        assert!(!entry.has_address());
        assert_eq!(entry.link_state, LinkState::Other);
    }

    #[test]
    fn test_blank_output_is_empty() {
        let snapshot = MembershipSnapshot::parse("\n\n").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_short_line_rejected() {
        let err = MembershipSnapshot::parse("abc 10.0.0.1:6379").unwrap_err();
        assert!(matches!(err, ParseError::InvalidClusterNodes(_)));
    }

    #[test]
    fn test_bad_address_rejected() {
        let err = MembershipSnapshot::parse("abc not-an-address master - 0 0 1 connected").unwrap_err();
        assert!(matches!(err, ParseError::InvalidAddress(_)));
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let text = cluster_nodes_text(&[
            ("a", "10.0.0.1", "myself,master", "connected"),
            ("a", "10.0.0.2", "master", "connected"),
        ]);

        let err = MembershipSnapshot::parse(&text).unwrap_err();
        assert_eq!(err, ParseError::DuplicateNodeId("a".to_string()));
    }
}

mod directory_tests {
    use redis_cluster_reconciler::Error;
    use redis_cluster_reconciler::directory::{
        CredentialSource, credential_source, peer_ordinal, peers_from_pods,
    };

    use crate::common::{PREFIX, PodBuilder};

    #[test]
    fn test_peer_ordinal() {
        assert_eq!(peer_ordinal("redis-cluster-0", PREFIX), Some(0));
        assert_eq!(peer_ordinal("redis-cluster-12", PREFIX), Some(12));
        assert_eq!(peer_ordinal("redis-cluster-metrics-0", PREFIX), None);
        assert_eq!(peer_ordinal("redis-cluster-", PREFIX), None);
        assert_eq!(peer_ordinal("other-0", PREFIX), None);
    }

    #[test]
    fn test_peers_ordered_by_ordinal() {
        let pods = vec![
            PodBuilder::new("redis-cluster-2").ip("10.0.0.3").build(),
            PodBuilder::new("redis-cluster-0").ip("10.0.0.1").build(),
            PodBuilder::new("redis-cluster-1").ip("10.0.0.2").build(),
            PodBuilder::new("unrelated-0").ip("10.0.0.99").build(),
        ];

        let peers = peers_from_pods(&pods, PREFIX, None).unwrap();

        let names: Vec<_> = peers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["redis-cluster-0", "redis-cluster-1", "redis-cluster-2"]);
        assert_eq!(peers[2].address, "10.0.0.3");
        assert_eq!(peers[2].ordinal, 2);
    }

    #[test]
    fn test_explicit_count_limits_peers() {
        let pods = vec![
            PodBuilder::new("redis-cluster-0").ip("10.0.0.1").build(),
            PodBuilder::new("redis-cluster-1").ip("10.0.0.2").build(),
            PodBuilder::new("redis-cluster-2").ip("10.0.0.3").build(),
        ];

        let peers = peers_from_pods(&pods, PREFIX, Some(2)).unwrap();
        assert_eq!(peers.len(), 2);
    }

    #[test]
    fn test_no_matching_pods() {
        let err = peers_from_pods(&[], PREFIX, None).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn test_missing_ordinal() {
        let pods = vec![
            PodBuilder::new("redis-cluster-0").ip("10.0.0.1").build(),
            PodBuilder::new("redis-cluster-2").ip("10.0.0.3").build(),
        ];

        let err = peers_from_pods(&pods, PREFIX, Some(3)).unwrap_err();
        assert!(err.to_string().contains("redis-cluster-1 not found"));
    }

    #[test]
    fn test_pod_without_ip() {
        let pods = vec![
            PodBuilder::new("redis-cluster-0").ip("10.0.0.1").build(),
            PodBuilder::new("redis-cluster-1").build(),
        ];

        let err = peers_from_pods(&pods, PREFIX, None).unwrap_err();
        assert!(err.to_string().contains("redis-cluster-1 has no IP"));
    }

    #[test]
    fn test_pending_pod() {
        let pods = vec![PodBuilder::new("redis-cluster-0").phase("Pending").build()];

        let err = peers_from_pods(&pods, PREFIX, None).unwrap_err();
        assert!(err.to_string().contains("not running"));
    }

    #[test]
    fn test_literal_password() {
        let pod = PodBuilder::new("redis-cluster-0").password("s3cret").build();

        assert_eq!(
            credential_source(&pod, None, "REDIS_PASSWORD"),
            CredentialSource::Literal("s3cret".to_string())
        );
    }

    #[test]
    fn test_secret_password() {
        let pod = PodBuilder::new("redis-cluster-0")
            .password_from_secret("redis-auth", "password")
            .build();

        assert_eq!(
            credential_source(&pod, None, "REDIS_PASSWORD"),
            CredentialSource::SecretRef {
                name: "redis-auth".to_string(),
                key: "password".to_string()
            }
        );
    }

    #[test]
    fn test_container_filter() {
        let pod = PodBuilder::new("redis-cluster-0").password("s3cret").build();

        assert_eq!(
            credential_source(&pod, Some("exporter"), "REDIS_PASSWORD"),
            CredentialSource::Absent
        );
        assert_eq!(
            credential_source(&pod, Some("redis"), "REDIS_PASSWORD"),
            CredentialSource::Literal("s3cret".to_string())
        );
    }

    #[test]
    fn test_absent_password() {
        let pod = PodBuilder::new("redis-cluster-0").build();

        assert_eq!(
            credential_source(&pod, None, "REDIS_PASSWORD"),
            CredentialSource::Absent
        );
    }
}

mod report_tests {
    use jiff::Timestamp;
    use redis_cluster_reconciler::reconcile::{ConsistencyReport, Discrepancy};
    use redis_cluster_reconciler::report::render_text;
    use redis_cluster_reconciler::{RunOutcome, RunSummary};

    use crate::common::three_peers;

    fn summary(initial: ConsistencyReport, outcome: RunOutcome) -> RunSummary {
        RunSummary {
            started_at: Timestamp::UNIX_EPOCH,
            finished_at: Timestamp::UNIX_EPOCH,
            dry_run: false,
            peers: three_peers(),
            initial,
            repairs: Vec::new(),
            convergence: None,
            final_report: None,
            outcome,
        }
    }

    fn checked_all() -> Vec<String> {
        three_peers().into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_already_healthy_report() {
        let initial = ConsistencyReport {
            checked_peers: checked_all(),
            discrepancies: Vec::new(),
        };

        let text = render_text(&summary(initial, RunOutcome::AlreadyHealthy));

        assert_eq!(text.matches("[ok]").count(), 3);
        assert!(!text.contains("== Repair"));
        assert!(text.ends_with("PASS: cluster already healthy\n"));
    }

    #[test]
    fn test_failure_lines_listed_under_peer() {
        let initial = ConsistencyReport {
            checked_peers: checked_all(),
            discrepancies: vec![Discrepancy::address_mismatch(
                "redis-cluster-2",
                "c",
                "10.0.0.3",
                "10.0.0.9",
            )],
        };

        let text = render_text(&summary(initial, RunOutcome::StillInconsistent));

        assert!(text.contains("[FAIL] redis-cluster-2 (10.0.0.3)"));
        assert!(text.contains("redis-cluster-2: node c at 10.0.0.9, reference says 10.0.0.3"));
        assert!(text.ends_with("FAIL: cluster still inconsistent\n"));
    }

    #[test]
    fn test_uncompared_peers_are_not_ok() {
        let initial = ConsistencyReport {
            checked_peers: vec!["redis-cluster-0".to_string()],
            discrepancies: vec![Discrepancy::unreachable("redis-cluster-0", "connection refused")],
        };

        let text = render_text(&summary(initial, RunOutcome::StillInconsistent));

        assert!(text.contains("[FAIL] redis-cluster-0 (10.0.0.1)"));
        assert!(text.contains("[skip] redis-cluster-1 (10.0.0.2) (not compared)"));
        assert!(text.contains("[skip] redis-cluster-2 (10.0.0.3) (not compared)"));
        assert!(!text.contains("[ok]"));
    }
}

mod error_tests {
    use redis_cluster_reconciler::Error;
    use redis_cluster_reconciler::client::PeerError;

    use crate::common::peer;

    #[test]
    fn test_unreachable_message_names_peer() {
        let err = Error::unreachable(
            &peer(1, "10.0.0.2"),
            &PeerError::Connection("connection refused".to_string()),
        );

        let message = err.to_string();
        assert!(message.contains("redis-cluster-1"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_command_message() {
        let err = Error::command(
            &peer(0, "10.0.0.1"),
            "CLUSTER FORGET c",
            &PeerError::Connection("ERR Unknown node c".to_string()),
        );

        assert!(err.to_string().starts_with("CLUSTER FORGET c failed on redis-cluster-0"));
    }

    #[test]
    fn test_resolution_and_credential_are_fatal() {
        assert!(Error::Resolution("x".to_string()).is_fatal());
        assert!(Error::Credential("x".to_string()).is_fatal());
    }
}
