// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Integration tests for redis-cluster-reconciler
//!
//! These tests require a running Kubernetes cluster accessible via kubeconfig
//! with a Redis Cluster StatefulSet deployed. They are marked with #[ignore]
//! and must be run explicitly:
//!
//! ```bash
//! REDIS_NAMESPACE=redis cargo test --test integration -- --ignored
//! ```
//!
//! `REDIS_NAMESPACE` (default `redis`) and `REDIS_POD_PREFIX` (default
//! `redis-cluster`) select the StatefulSet. Peers are reached through
//! port-forwarding so the tests work from outside the cluster network.


pub use cluster::*;
