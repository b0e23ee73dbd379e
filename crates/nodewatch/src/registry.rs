use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::MonitorError;
use crate::node::{Node, NodeId};
use crate::settings::MonitorSettings;
use crate::validation::{validate_node, validate_required};

/// Values applied to zero-valued node fields on registration.
#[derive(Debug, Clone, Copy)]
struct Defaults {
    interval: Duration,
    timeout: Duration,
    failure_threshold: u32,
}

/// Concurrent store of monitored nodes, keyed by node id.
///
/// Has its own lock, independent of the result store.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Node>>,
    defaults: Defaults,
}

impl NodeRegistry {
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            defaults: Defaults {
                interval: settings.default_interval(),
                timeout: settings.default_timeout(),
                failure_threshold: settings.default_failure_threshold,
            },
        }
    }

    /// Validate, fill defaults and store `node`, replacing any entry with the
    /// same id. Returns the stored record.
    pub async fn register(&self, mut node: Node) -> Result<Node, MonitorError> {
        validate_required(&node)?;

        if node.check_interval.is_zero() {
            node.check_interval = self.defaults.interval;
        }
        if node.timeout.is_zero() {
            node.timeout = self.defaults.timeout;
        }
        if node.failure_threshold == 0 {
            node.failure_threshold = self.defaults.failure_threshold;
        }

        validate_node(&node)?;

        let mut nodes = self.nodes.write().await;
        if nodes.insert(node.id.clone(), node.clone()).is_some() {
            debug!(node_id = %node.id, "Replaced existing node registration");
        }

        Ok(node)
    }

    pub async fn remove(&self, id: &NodeId) -> Option<Node> {
        self.nodes.write().await.remove(id)
    }

    pub async fn exists(&self, id: &NodeId) -> bool {
        self.nodes.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &NodeId) -> Option<Node> {
        self.nodes.read().await.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<Node> {
        self.nodes.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Ids of nodes due for a check at `now`, skipping those in `in_flight`.
    pub async fn due_nodes(&self, now: DateTime<Utc>, in_flight: &HashSet<NodeId>) -> Vec<NodeId> {
        self.nodes
            .read()
            .await
            .values()
            .filter(|node| !in_flight.contains(&node.id) && node.is_due(now))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Replace the record for `id` with the node produced by `apply`, under the
    /// write lock. Returns `None` if the node is no longer registered.
    pub async fn update<F, R>(&self, id: &NodeId, apply: F) -> Option<R>
    where
        F: FnOnce(&Node) -> (Node, R),
    {
        let mut nodes = self.nodes.write().await;
        let entry = nodes.get_mut(id)?;
        let (updated, extra) = apply(entry);
        *entry = updated;
        Some(extra)
    }
}
