//! Downtime and recovery alerts.
//!
//! The dispatcher turns a [`Transition`] into at most one alert and hands it
//! to the [`Notifier`] on a detached task, so a slow notifier never holds up
//! a probe worker. Send failures are logged and dropped; nothing here feeds
//! back into the monitoring loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::error::NotificationError;
use crate::node::{Node, NodeId, ProtocolKind};
use crate::probe::ProbeOutcome;
use crate::tracker::Transition;

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// A node has been down for at least its failure threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DowntimeAlert {
    pub node_id: NodeId,
    pub name: String,
    pub endpoint: String,
    pub kind: Option<ProtocolKind>,
    /// Start of the current failure streak.
    pub down_since: Option<DateTime<Utc>>,
    pub last_seen_up: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub error: Option<String>,
}

/// A node that was down answered again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryAlert {
    pub node_id: NodeId,
    pub name: String,
    pub endpoint: String,
    pub went_down_at: Option<DateTime<Utc>>,
    pub recovered_at: DateTime<Utc>,
    #[serde(rename = "downtime_ms", serialize_with = "as_millis")]
    pub downtime: Duration,
    #[serde(rename = "response_time_ms", serialize_with = "as_millis")]
    pub response_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Alert {
    Downtime(DowntimeAlert),
    Recovery(RecoveryAlert),
}

impl Alert {
    pub fn node_id(&self) -> &NodeId {
        match self {
            Alert::Downtime(alert) => &alert.node_id,
            Alert::Recovery(alert) => &alert.node_id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Alert::Downtime(_) => "downtime",
            Alert::Recovery(_) => "recovery",
        }
    }
}

/// Delivery channel for alerts. Transport is up to the implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_downtime_alert(&self, alert: &DowntimeAlert) -> Result<(), NotificationError>;

    async fn send_recovery_alert(&self, alert: &RecoveryAlert) -> Result<(), NotificationError>;
}

/// How a single send ended.
#[derive(Debug)]
pub enum SendOutcome {
    Delivered,
    Failed(NotificationError),
    TimedOut(Duration),
}

/// Build the alert, if any, for one applied check.
pub fn alert_for(node: &Node, transition: &Transition, outcome: &ProbeOutcome) -> Option<Alert> {
    if let Some(recovery) = &transition.recovery {
        return Some(Alert::Recovery(RecoveryAlert {
            node_id: node.id.clone(),
            name: node.name.clone(),
            endpoint: node.endpoint.clone(),
            went_down_at: recovery.went_down_at,
            recovered_at: recovery.recovered_at,
            downtime: recovery.downtime,
            response_time: outcome.response_time,
        }));
    }

    if transition.downtime_alert {
        return Some(Alert::Downtime(DowntimeAlert {
            node_id: node.id.clone(),
            name: node.name.clone(),
            endpoint: node.endpoint.clone(),
            kind: node.kind,
            down_since: node.last_status_change,
            last_seen_up: node.last_seen_up,
            consecutive_failures: node.failure_count,
            error: outcome.error.as_ref().map(ToString::to_string),
        }));
    }

    None
}

/// Send `alert`, giving up after `deadline`.
pub async fn deliver(notifier: &dyn Notifier, alert: &Alert, deadline: Duration) -> SendOutcome {
    let send = async {
        match alert {
            Alert::Downtime(alert) => notifier.send_downtime_alert(alert).await,
            Alert::Recovery(alert) => notifier.send_recovery_alert(alert).await,
        }
    };

    match timeout(deadline, send).await {
        Ok(Ok(())) => SendOutcome::Delivered,
        Ok(Err(error)) => SendOutcome::Failed(error),
        Err(_) => SendOutcome::TimedOut(deadline),
    }
}

pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    deadline: Duration,
    tasks: TaskTracker,
    draining: Mutex<()>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, deadline: Duration) -> Self {
        Self { notifier, deadline, tasks: TaskTracker::new(), draining: Mutex::new(()) }
    }

    /// Fire the alert for this check, if any, without waiting for delivery.
    pub fn dispatch(
        &self,
        node: &Node,
        transition: &Transition,
        outcome: &ProbeOutcome,
    ) -> Option<Alert> {
        let alert = alert_for(node, transition, outcome)?;

        let notifier = Arc::clone(&self.notifier);
        let deadline = self.deadline;
        let sent = alert.clone();
        self.tasks.spawn(async move {
            let node_id = sent.node_id();
            let kind = sent.label();
            match deliver(notifier.as_ref(), &sent, deadline).await {
                SendOutcome::Delivered => info!(%node_id, kind, "Alert delivered"),
                SendOutcome::Failed(error) => {
                    warn!(%node_id, kind, %error, "Alert delivery failed")
                }
                SendOutcome::TimedOut(deadline) => {
                    warn!(%node_id, kind, ?deadline, "Alert delivery timed out")
                }
            }
        });

        Some(alert)
    }

    /// Wait for every send started so far. Concurrent drains run one after
    /// the other, since reopening the tracker ends another caller's wait.
    pub async fn drain(&self) {
        let _draining = self.draining.lock().await;
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}
