//! Protocol specific liveness probes.
//!
//! Each [`Probe`] only reports whether the node answered correctly. The
//! [`ProbeSet`] picks the probe for a node kind, enforces the node's timeout
//! and measures the response time.

pub mod http;
pub mod rpc;
pub mod tls;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;

use crate::directory::ConnectionInfo;
use crate::error::{MonitorError, ProbeError};
use crate::node::{NodeStatus, ProtocolKind};

pub use http::HttpProbe;
pub use rpc::RpcProbe;
pub use tls::TlsProbe;

/// Result of probing one node once.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: NodeStatus,
    pub response_time: Duration,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    pub fn up(response_time: Duration) -> Self {
        Self { status: NodeStatus::Up, response_time, error: None }
    }

    pub fn down(response_time: Duration, error: ProbeError) -> Self {
        Self { status: NodeStatus::Down, response_time, error: Some(error) }
    }
}

/// A liveness check for one kind of node.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Succeeds if the node is alive. `timeout` is the node's own probe
    /// timeout; the caller enforces it as well.
    async fn check(&self, conn: &ConnectionInfo, timeout: Duration) -> Result<(), ProbeError>;
}

/// Mapping from node kind to probe strategy.
#[derive(Clone)]
pub struct ProbeSet {
    probes: HashMap<ProtocolKind, Arc<dyn Probe>>,
}

impl ProbeSet {
    /// TLS handshake for consensus nodes, `net_version` for full nodes, GET
    /// for HTTP nodes.
    pub fn standard() -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nodewatch/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MonitorError::ProbeSetup(describe(&e)))?;

        Ok(Self::empty()
            .with_probe(ProtocolKind::Consensus, Arc::new(TlsProbe))
            .with_probe(ProtocolKind::FullNode, Arc::new(RpcProbe::new(client.clone())))
            .with_probe(ProtocolKind::Http, Arc::new(HttpProbe::new(client))))
    }

    pub fn empty() -> Self {
        Self { probes: HashMap::new() }
    }

    /// Use `probe` for nodes of `kind`, replacing any previous mapping.
    pub fn with_probe(mut self, kind: ProtocolKind, probe: Arc<dyn Probe>) -> Self {
        self.probes.insert(kind, probe);
        self
    }

    /// Probe a node of `kind`. Unmapped kinds are down without any network
    /// call.
    pub async fn probe(
        &self,
        kind: Option<ProtocolKind>,
        conn: &ConnectionInfo,
        node_timeout: Duration,
    ) -> ProbeOutcome {
        let Some(probe) = kind.and_then(|kind| self.probes.get(&kind)) else {
            let kind = kind.map_or_else(|| "unset".to_string(), |kind| kind.to_string());
            return ProbeOutcome::down(Duration::ZERO, ProbeError::UnsupportedKind(kind));
        };

        let start = Instant::now();
        let result = timeout(node_timeout, probe.check(conn, node_timeout))
            .await
            .unwrap_or(Err(ProbeError::Timeout(node_timeout)));
        let response_time = start.elapsed();

        match result {
            Ok(()) => ProbeOutcome::up(response_time),
            Err(error) => {
                debug!(endpoint = %conn.endpoint, %error, "Probe failed");
                ProbeOutcome::down(response_time, error)
            }
        }
    }
}

/// Render an error with its chain of causes.
pub(crate) fn describe(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
