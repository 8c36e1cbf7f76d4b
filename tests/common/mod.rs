//! Shared test infrastructure (used by unit, functional and proptest).
//!
//! Each test binary pulls this in with `#[path = "../common/mod.rs"]`, so
//! not every helper is used by every binary.
#![allow(dead_code, unused_imports)]


pub use fake_cluster::*;
pub use fixtures::*;
