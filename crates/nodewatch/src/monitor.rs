use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cycle::{CheckCycle, InFlight};
use crate::directory::NodeDirectory;
use crate::error::MonitorError;
use crate::node::{Node, NodeId};
use crate::notify::{Dispatcher, Notifier};
use crate::probe::ProbeSet;
use crate::registry::NodeRegistry;
use crate::results::{CheckResult, ResultStore};
use crate::scheduler::Scheduler;
use crate::settings::MonitorSettings;

/// Node health monitor: registry, result cache, scheduler and alerting.
///
/// ```ignore
/// let monitor = HealthMonitor::new(settings, directory, notifier)?;
/// monitor.register(Node::new("orderer0", "Orderer 0", "orderer0:7050", ProtocolKind::Consensus)).await?;
/// monitor.start(&shutdown)?;
/// // ...
/// monitor.stop().await?;
/// ```
pub struct HealthMonitor {
    cycle: Arc<CheckCycle>,
    scheduler: Scheduler,
}

impl HealthMonitor {
    /// Monitor using the standard probe for each node kind.
    pub fn new(
        settings: MonitorSettings,
        directory: Arc<dyn NodeDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        Self::with_probes(settings, directory, notifier, ProbeSet::standard()?)
    }

    pub fn with_probes(
        settings: MonitorSettings,
        directory: Arc<dyn NodeDirectory>,
        notifier: Arc<dyn Notifier>,
        probes: ProbeSet,
    ) -> Result<Self, MonitorError> {
        settings.validate()?;

        let cycle = Arc::new(CheckCycle {
            registry: Arc::new(NodeRegistry::new(&settings)),
            results: Arc::new(ResultStore::new()),
            directory,
            probes,
            dispatcher: Dispatcher::new(notifier, settings.notification_deadline()),
            realert: settings.realert,
            in_flight: InFlight::default(),
        });
        let scheduler = Scheduler::new(
            Arc::clone(&cycle),
            settings.workers,
            settings.tick(),
            settings.queue_capacity,
        );

        Ok(Self { cycle, scheduler })
    }

    /// Add or replace a node. Unset interval, timeout and threshold take the
    /// configured defaults.
    pub async fn register(&self, node: Node) -> Result<Node, MonitorError> {
        let node = self.cycle.registry.register(node).await?;
        info!(node_id = %node.id, kind = ?node.kind, endpoint = %node.endpoint, "Node registered");
        Ok(node)
    }

    /// Remove a node and its cached result. Unknown ids are ignored.
    pub async fn unregister(&self, id: &NodeId) {
        if self.cycle.registry.remove(id).await.is_some() {
            info!(node_id = %id, "Node unregistered");
        }
        self.cycle.results.remove(id).await;
    }

    pub async fn exists(&self, id: &NodeId) -> bool {
        self.cycle.registry.exists(id).await
    }

    /// Latest check result for `id`; `NotFound` if the node is unknown or has
    /// not been checked yet.
    pub async fn get_status(&self, id: &NodeId) -> Result<CheckResult, MonitorError> {
        self.cycle.results.get(id).await.ok_or_else(|| MonitorError::NotFound(id.clone()))
    }

    pub async fn get_all_statuses(&self) -> Vec<CheckResult> {
        self.cycle.results.all().await
    }

    /// Snapshots of every registered node.
    pub async fn nodes(&self) -> Vec<Node> {
        self.cycle.registry.all().await
    }

    /// Check one node right away, outside the schedule.
    ///
    /// Alerts are sent as for a scheduled check. Fails with
    /// `CheckInProgress` while a scheduled check of the same node is running.
    pub async fn check_now(&self, id: &NodeId) -> Result<CheckResult, MonitorError> {
        let claim = self
            .cycle
            .in_flight
            .claim(id)
            .ok_or_else(|| MonitorError::CheckInProgress(id.clone()))?;
        self.cycle.run(&claim).await.ok_or_else(|| MonitorError::NotFound(id.clone()))
    }

    /// Start periodic checking. Can only be called once.
    pub fn start(&self, shutdown: &CancellationToken) -> Result<(), MonitorError> {
        self.scheduler.start(shutdown)
    }

    /// Stop periodic checking and wait for workers and pending alerts.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        self.scheduler.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Wait for alert sends started so far.
    pub async fn flush_notifications(&self) {
        self.cycle.dispatcher.drain().await;
    }
}
