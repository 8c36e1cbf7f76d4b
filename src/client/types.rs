//! Types for parsed cluster membership information.
//!
//! These types represent the parsed output of `CLUSTER NODES` as seen by a
//! single peer. Raw text never leaves the client module: everything above it
//! works with [`MembershipSnapshot`] and [`NodeEntry`].

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when parsing membership data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid cluster nodes format: {0}")]
    InvalidClusterNodes(String),
    #[error("Invalid node address: {0}")]
    InvalidAddress(String),
    #[error("Duplicate node id in snapshot: {0}")]
    DuplicateNodeId(String),
}

/// `ip:port@cport[,hostname]`. IPv6 hosts keep their colons, so the port is
/// taken from the last colon before `@`.
static ADDRESS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<host>.*):(?P<port>\d+)(?:@(?P<bus>\d+))?(?:,.*)?$").ok());

/// Link state of a membership entry as reported by the observing peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// The cluster bus link is up.
    Connected,
    /// The node is still in handshake (first contact, identity not confirmed).
    Handshake,
    /// The node is flagged `fail` or `fail?`.
    Fail,
    /// Anything else, most commonly `disconnected`.
    Other,
}

impl LinkState {
    /// Derive the link state from the flags token set and the link field.
    ///
    /// Failure flags win over the link field: a node can be reported as
    /// `connected` on the bus while still carrying `fail?`.
    pub fn classify(flags: &BTreeSet<String>, link_field: &str) -> Self {
        if flags.contains("fail") || flags.contains("fail?") {
            LinkState::Fail
        } else if flags.contains("handshake") {
            LinkState::Handshake
        } else if link_field == "connected" {
            LinkState::Connected
        } else {
            LinkState::Other
        }
    }

    /// Fail and Handshake both block convergence.
    pub fn is_failing(&self) -> bool {
        matches!(self, LinkState::Fail | LinkState::Handshake)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Connected => write!(f, "connected"),
            LinkState::Handshake => write!(f, "handshake"),
            LinkState::Fail => write!(f, "fail"),
            LinkState::Other => write!(f, "other"),
        }
    }
}

/// One row of a peer's membership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEntry {
    /// Cluster-assigned node identity (40 hex characters on a real cluster).
    pub node_id: String,
    /// Host portion of the address this peer believes the node lives at.
    pub address: String,
    /// Client port.
    pub port: u16,
    /// Flag tokens (`myself`, `master`, `slave`, `fail?`, ...).
    pub flags: BTreeSet<String>,
    /// Link state as classified by [`LinkState::classify`].
    pub link_state: LinkState,
}

impl NodeEntry {
    /// Check if this is the observing peer's own entry.
    pub fn is_myself(&self) -> bool {
        self.flags.contains("myself")
    }

    /// Check if the link to this node is healthy.
    pub fn is_connected(&self) -> bool {
        self.link_state == LinkState::Connected
    }

    /// Nodes that have never been given an address report `noaddr` and an
    /// empty host.
    pub fn has_address(&self) -> bool {
        !self.address.is_empty() && !self.flags.contains("noaddr")
    }

    /// Parse a single line from `CLUSTER NODES` output.
    ///
    /// Only the first three fields and the link-state field matter; slot
    /// ranges after the link state are ignored.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [node_id, raw_address, raw_flags, rest @ ..] = parts.as_slice() else {
            return Err(ParseError::InvalidClusterNodes(format!(
                "Not enough fields in line: {}",
                line
            )));
        };

        let (address, port) = parse_address(raw_address)?;

        let flags: BTreeSet<String> = raw_flags
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty() && *f != "noflags")
            .map(str::to_string)
            .collect();

        // master-id, ping-sent, pong-recv, config-epoch, link-state
        let link_field = rest.get(4).copied().unwrap_or_default();
        let link_state = LinkState::classify(&flags, link_field);

        Ok(NodeEntry {
            node_id: (*node_id).to_string(),
            address,
            port,
            flags,
            link_state,
        })
    }
}

/// Split `ip:port@cport` into host and client port.
pub fn parse_address(raw: &str) -> Result<(String, u16), ParseError> {
    let re = ADDRESS_RE
        .as_ref()
        .ok_or_else(|| ParseError::InvalidAddress("address pattern unavailable".to_string()))?;

    let caps = re
        .captures(raw)
        .ok_or_else(|| ParseError::InvalidAddress(raw.to_string()))?;

    let host = caps.name("host").map(|m| m.as_str()).unwrap_or_default();
    let port = caps
        .name("port")
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .ok_or_else(|| ParseError::InvalidAddress(format!("Invalid port in {}", raw)))?;

    Ok((host.to_string(), port))
}

/// A point-in-time view of one peer's membership table.
///
/// Entries keep the order in which the peer reported them; node ids are
/// unique within a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipSnapshot {
    entries: Vec<NodeEntry>,
}

impl MembershipSnapshot {
    /// Build a snapshot from entries, rejecting duplicate node ids.
    pub fn from_entries(entries: Vec<NodeEntry>) -> Result<Self, ParseError> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(entry.node_id.as_str()) {
                return Err(ParseError::DuplicateNodeId(entry.node_id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Parse the output of `CLUSTER NODES`.
    pub fn parse(output: &str) -> Result<Self, ParseError> {
        let entries = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(NodeEntry::parse_line)
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_entries(entries)
    }

    /// All entries in reported order.
    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by node id.
    pub fn get(&self, node_id: &str) -> Option<&NodeEntry> {
        self.entries.iter().find(|e| e.node_id == node_id)
    }

    /// The observing peer's own entry.
    pub fn myself(&self) -> Option<&NodeEntry> {
        self.entries.iter().find(|e| e.is_myself())
    }

    /// Number of entries whose link is connected.
    pub fn connected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_connected()).count()
    }

    /// Number of entries in fail or handshake.
    pub fn failing_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.link_state.is_failing())
            .count()
    }
}
