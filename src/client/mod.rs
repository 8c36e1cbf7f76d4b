//! Redis client module for cluster membership operations.
//!
//! This module provides a typed wrapper around the `fred` Redis client for
//! the three commands the reconciler issues against individual peers.
//!
//! ## Architecture
//!
//! - `redis_client`: Per-peer connection cache and raw command wrappers
//! - `types`: Parsed membership table (`CLUSTER NODES`)
//! - `protocol`: The [`PeerProtocol`] seam used by the reconciler
//!
//! ## Example
//!
//! ```rust,ignore
//! use redis_cluster_reconciler::client::{PeerClientConfig, PeerProtocol, RedisPeerClient};
//!
//! let client = RedisPeerClient::new(PeerClientConfig::default(), strategy);
//! let snapshot = client.read_snapshot(&peer).await?;
//! println!("{} connected", snapshot.connected_count());
//! ```

pub mod protocol;
pub mod redis_client;
pub mod types;

pub use protocol::PeerProtocol;
pub use redis_client::{PeerClientConfig, PeerError, RedisPeerClient};
pub use types::{LinkState, MembershipSnapshot, NodeEntry, ParseError};
