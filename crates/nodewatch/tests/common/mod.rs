//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nodewatch::{
    ConnectionInfo, DirectoryError, DowntimeAlert, MonitorSettings, Node, NodeDirectory, Notifier,
    NotificationError, Probe, ProbeError, ProtocolKind, RecoveryAlert,
};
use tokio::sync::Notify;

pub fn http_node(id: &str) -> Node {
    Node::new(id, format!("Node {id}"), format!("http://{id}.test/health"), ProtocolKind::Http)
}

pub fn settings() -> MonitorSettings {
    MonitorSettings { tick_millis: 10, notification_deadline_secs: 1, ..Default::default() }
}

/// Resolves every node to its registered endpoint; ids in `failing` error out.
#[derive(Default)]
pub struct FakeDirectory {
    pub failing: Mutex<HashSet<String>>,
}

#[async_trait]
impl NodeDirectory for FakeDirectory {
    async fn resolve(&self, node: &Node) -> Result<ConnectionInfo, DirectoryError> {
        if self.failing.lock().unwrap().contains(node.id.as_str()) {
            return Err(DirectoryError::Material("certificate file missing".into()));
        }
        Ok(ConnectionInfo::new(node.endpoint.clone()))
    }
}

/// Replays a scripted sequence of up (`true`) / down (`false`) answers per
/// endpoint; answers up once a script runs out.
#[derive(Default)]
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, VecDeque<bool>>>,
}

impl ScriptedProbe {
    pub fn script(&self, endpoint: &str, answers: &[bool]) {
        self.scripts.lock().unwrap().insert(endpoint.to_string(), answers.iter().copied().collect());
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, conn: &ConnectionInfo, _timeout: Duration) -> Result<(), ProbeError> {
        let answer = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&conn.endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or(true);

        if answer {
            Ok(())
        } else {
            Err(ProbeError::Connect { address: conn.endpoint.clone(), reason: "refused".into() })
        }
    }
}

/// Slow probe that records how many checks of the same endpoint overlap.
pub struct OverlapProbe {
    pub delay: Duration,
    active: Mutex<HashMap<String, usize>>,
    pub max_overlap: AtomicUsize,
    pub calls: AtomicUsize,
}

impl OverlapProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: Mutex::new(HashMap::new()),
            max_overlap: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Probe for OverlapProbe {
    async fn check(&self, conn: &ConnectionInfo, _timeout: Duration) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(conn.endpoint.clone()).or_default();
            *count += 1;
            self.max_overlap.fetch_max(*count, Ordering::SeqCst);
        }

        tokio::time::sleep(self.delay).await;

        *self.active.lock().unwrap().entry(conn.endpoint.clone()).or_default() -= 1;
        Ok(())
    }
}

/// Reports down, but only once the test lets it go: `entered` fires when a
/// check starts, `release` lets it return.
#[derive(Default)]
pub struct GatedProbe {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Probe for GatedProbe {
    async fn check(&self, conn: &ConnectionInfo, _timeout: Duration) -> Result<(), ProbeError> {
        self.entered.notify_one();
        self.release.notified().await;
        Err(ProbeError::Connect { address: conn.endpoint.clone(), reason: "refused".into() })
    }
}

/// Panics for endpoints containing `bad`, answers up otherwise.
#[derive(Default)]
pub struct PanickingProbe {
    pub panics: AtomicUsize,
}

#[async_trait]
impl Probe for PanickingProbe {
    async fn check(&self, conn: &ConnectionInfo, _timeout: Duration) -> Result<(), ProbeError> {
        if conn.endpoint.contains("bad") {
            self.panics.fetch_add(1, Ordering::SeqCst);
            panic!("probe for {} blew up", conn.endpoint);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub downtime: Mutex<Vec<DowntimeAlert>>,
    pub recovery: Mutex<Vec<RecoveryAlert>>,
}

impl RecordingNotifier {
    pub fn downtime_count(&self) -> usize {
        self.downtime.lock().unwrap().len()
    }

    pub fn recovery_count(&self) -> usize {
        self.recovery.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_downtime_alert(&self, alert: &DowntimeAlert) -> Result<(), NotificationError> {
        self.downtime.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn send_recovery_alert(&self, alert: &RecoveryAlert) -> Result<(), NotificationError> {
        self.recovery.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Always fails, counting attempts.
#[derive(Default)]
pub struct FailingNotifier {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_downtime_alert(&self, _: &DowntimeAlert) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::Transport("webhook unreachable".into()))
    }

    async fn send_recovery_alert(&self, _: &RecoveryAlert) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::Transport("webhook unreachable".into()))
    }
}
