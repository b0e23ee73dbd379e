use std::time::Duration;

use thiserror::Error;

use crate::node::NodeId;

/// Errors returned to callers of the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid node registration: {0}")]
    Validation(String),

    #[error("no status recorded for node {0}")]
    NotFound(NodeId),

    #[error("a check of node {0} is already in progress")]
    CheckInProgress(NodeId),

    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler is not running")]
    NotRunning,

    #[error("invalid monitor settings: {0}")]
    Settings(String),

    #[error("failed to initialise probes: {0}")]
    ProbeSetup(String),
}

/// Failure of a single liveness check.
///
/// Never escapes the scheduler: a probe error always becomes a Down outcome
/// for that node and cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("no TLS material configured for consensus node")]
    MissingTlsMaterial,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP check failed with status code: {0}")]
    HttpStatus(u16),

    #[error("invalid JSON-RPC response: {0}")]
    Decode(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("JSON-RPC response carried an empty result")]
    EmptyResult,

    #[error("unsupported node kind: {0}")]
    UnsupportedKind(String),

    #[error("node directory lookup failed: {0}")]
    Directory(String),
}

/// Failure of the external node directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("node {0} is not known to the directory")]
    UnknownNode(NodeId),

    #[error("failed to load connection material: {0}")]
    Material(String),
}

/// Failure reported by a notifier. Logged by the dispatcher, never retried.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notifier transport failed: {0}")]
    Transport(String),

    #[error("notifier rejected alert: {0}")]
    Rejected(String),
}
