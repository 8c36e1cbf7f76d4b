// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the reconciliation cycle.
//!
//! These run the real checker, repair engine and convergence waiter against
//! an in-memory cluster. No Kubernetes or Redis is required.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run a specific test
//! cargo test --test functional test_moved_peer_is_repaired
//! ```
//!
//! ## Test Categories
//!
//! - **Check tests**: consistency reports for healthy, moved and unreachable peers
//! - **Repair tests**: forget/meet selection, dry-run, idempotence, failures
//! - **Convergence tests**: polling bounds with paused time
//! - **Run tests**: the full check, repair, wait, re-check cycle

#[path = "../common/mod.rs"]
mod common;

mod check_tests;
