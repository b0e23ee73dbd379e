use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::node::{Node, NodeId, NodeStatus};

/// Outcome of the latest check of one node.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// The node record as it stood right after this check was applied.
    pub node: Node,
    pub status: NodeStatus,
    pub response_time: Duration,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    pub fn node_id(&self) -> &NodeId {
        &self.node.id
    }

    /// Response time in milliseconds
    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.response_time.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Latest check result per node. A cache, not a history.
#[derive(Default)]
pub struct ResultStore {
    results: RwLock<HashMap<NodeId, CheckResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result`, replacing any earlier result for the same node.
    pub async fn put(&self, result: CheckResult) {
        self.results.write().await.insert(result.node.id.clone(), result);
    }

    pub async fn get(&self, id: &NodeId) -> Option<CheckResult> {
        self.results.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &NodeId) -> Option<CheckResult> {
        self.results.write().await.remove(id)
    }

    /// All cached results, in no particular order.
    pub async fn all(&self) -> Vec<CheckResult> {
        self.results.read().await.values().cloned().collect()
    }
}
