//! Nodewatch - health monitoring for blockchain network nodes
//!
//! Consensus nodes are checked with a TLS handshake on their gossip port,
//! full nodes with a JSON-RPC call and plain services with an HTTP GET. Each
//! node carries an up/down state with a failure threshold; downtime and
//! recovery alerts fire on the transitions.

mod cycle;
pub mod directory;
pub mod error;
pub mod monitor;
pub mod node;
pub mod notify;
pub mod probe;
pub mod registry;
pub mod results;
mod scheduler;
pub mod settings;
pub mod tracker;
mod validation;

pub use directory::{ConnectionInfo, EndpointDirectory, NodeDirectory, RpcAddress, TlsMaterial};
pub use error::{DirectoryError, MonitorError, NotificationError, ProbeError};
pub use monitor::HealthMonitor;
pub use node::{Node, NodeId, NodeStatus, ProtocolKind};
pub use notify::{Alert, DowntimeAlert, Notifier, RecoveryAlert};
pub use probe::{Probe, ProbeOutcome, ProbeSet};
pub use results::CheckResult;
pub use settings::{MonitorSettings, RealertPolicy};

pub use tokio_util::sync::CancellationToken;
