use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque node identity, unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the zero value: empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How a node is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Orderer/peer style node, checked with a TLS handshake on its gossip port.
    Consensus,
    /// RPC serving node, checked with a `net_version` JSON-RPC call.
    FullNode,
    /// Plain HTTP endpoint, any 2xx is healthy.
    Http,
    /// A kind this build does not know how to probe.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Consensus => write!(f, "consensus"),
            ProtocolKind::FullNode => write!(f, "full_node"),
            ProtocolKind::Http => write!(f, "http"),
            ProtocolKind::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Up,
    Down,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Up => write!(f, "up"),
            NodeStatus::Down => write!(f, "down"),
        }
    }
}

/// A monitored node as held by the registry.
///
/// Zero `check_interval`, `timeout` or `failure_threshold` mean "unset" and
/// are filled from [`crate::MonitorSettings`] on registration. After that the
/// record is only mutated by the state tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,

    /// `host:port` for consensus nodes, a URL for HTTP nodes.
    pub endpoint: String,
    pub kind: Option<ProtocolKind>,

    pub check_interval: Duration,
    pub timeout: Duration,
    pub failure_threshold: u32,

    pub status: NodeStatus,
    pub failure_count: u32,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_status_change: Option<DateTime<Utc>>,
    pub last_seen_up: Option<DateTime<Utc>>,

    /// When the current outage last produced a downtime alert.
    pub last_downtime_alert: Option<DateTime<Utc>>,
}

impl Node {
    /// A fresh node, assumed up until its first check says otherwise.
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        kind: ProtocolKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            kind: Some(kind),
            check_interval: Duration::ZERO,
            timeout: Duration::ZERO,
            failure_threshold: 0,
            status: NodeStatus::Up,
            failure_count: 0,
            last_checked: None,
            last_status_change: None,
            last_seen_up: None,
            last_downtime_alert: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// A node that was never checked is always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(last_checked) = self.last_checked else {
            return true;
        };
        match (now - last_checked).to_std() {
            Ok(elapsed) => elapsed >= self.check_interval,
            // Clock went backwards: wait for it to catch up.
            Err(_) => false,
        }
    }
}
