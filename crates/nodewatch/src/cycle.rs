use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::directory::NodeDirectory;
use crate::error::ProbeError;
use crate::node::{NodeId, NodeStatus};
use crate::notify::Dispatcher;
use crate::probe::{ProbeOutcome, ProbeSet};
use crate::registry::NodeRegistry;
use crate::results::{CheckResult, ResultStore};
use crate::settings::RealertPolicy;

/// Node ids with a check under way.
#[derive(Clone, Default)]
pub(crate) struct InFlight(Arc<Mutex<HashSet<NodeId>>>);

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id` for one check; `None` if a check already holds it.
    pub(crate) fn claim(&self, id: &NodeId) -> Option<Claim> {
        self.lock().insert(id.clone()).then(|| Claim { in_flight: self.clone(), id: id.clone() })
    }

    pub(crate) fn snapshot(&self) -> HashSet<NodeId> {
        self.lock().clone()
    }
}

/// Exclusive right to check one node. Released on drop, including when the
/// check panics.
pub(crate) struct Claim {
    in_flight: InFlight,
    id: NodeId,
}

impl Claim {
    pub(crate) fn id(&self) -> &NodeId {
        &self.id
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

/// Everything needed to check one node: resolve, probe, track, store, alert.
pub(crate) struct CheckCycle {
    pub(crate) registry: Arc<NodeRegistry>,
    pub(crate) results: Arc<ResultStore>,
    pub(crate) directory: Arc<dyn NodeDirectory>,
    pub(crate) probes: ProbeSet,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) realert: RealertPolicy,
    pub(crate) in_flight: InFlight,
}

impl CheckCycle {
    /// Check the claimed node once. Returns `None` if the node is not
    /// registered, or was removed while the probe ran.
    pub(crate) async fn run(&self, claim: &Claim) -> Option<CheckResult> {
        let id = claim.id();
        let snapshot = self.registry.get(id).await?;

        let outcome = match self.directory.resolve(&snapshot).await {
            Ok(conn) => self.probes.probe(snapshot.kind, &conn, snapshot.timeout).await,
            Err(error) => {
                warn!(node_id = %id, %error, "Node directory lookup failed");
                ProbeOutcome::down(Duration::ZERO, ProbeError::Directory(error.to_string()))
            }
        };

        let now = Utc::now();
        let realert = self.realert;
        let (node, transition) = self
            .registry
            .update(id, |previous| {
                let (node, transition) = crate::tracker::apply(previous, &outcome, now, realert);
                (node.clone(), (node, transition))
            })
            .await?;

        if transition.status_changed {
            match node.status {
                NodeStatus::Up => info!(node_id = %id, name = %node.name, "Node is back up"),
                NodeStatus::Down => warn!(
                    node_id = %id,
                    name = %node.name,
                    error = ?outcome.error,
                    "Node went down"
                ),
            }
        }

        let result = CheckResult {
            node: node.clone(),
            status: outcome.status,
            response_time: outcome.response_time,
            error: outcome.error.as_ref().map(ToString::to_string),
            checked_at: now,
        };
        self.results.put(result.clone()).await;

        // Unregister may have run between the update and the put above.
        if !self.registry.exists(id).await {
            self.results.remove(id).await;
            debug!(node_id = %id, "Dropped result for unregistered node");
            return None;
        }

        self.dispatcher.dispatch(&node, &transition, &outcome);
        Some(result)
    }
}
