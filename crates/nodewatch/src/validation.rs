//! Registration checks for monitored nodes.
//!
//! Runs after defaults are applied, so zero values here are genuine errors.

use std::time::Duration;

use url::Url;

use crate::error::MonitorError;
use crate::node::{Node, ProtocolKind};

const MAX_INTERVAL: Duration = Duration::from_secs(86_400); // 24 hours
const MAX_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes

fn invalid(reason: impl Into<String>) -> MonitorError {
    MonitorError::Validation(reason.into())
}

/// Fields that must be present before defaults can be applied.
pub fn validate_required(node: &Node) -> Result<(), MonitorError> {
    if node.id.is_blank() {
        return Err(invalid("node id must not be empty"));
    }
    if node.endpoint.trim().is_empty() {
        return Err(invalid(format!("node {} has no endpoint", node.id)));
    }
    if node.kind.is_none() {
        return Err(invalid(format!("node {} has no protocol kind", node.id)));
    }
    Ok(())
}

/// Full check of a node with defaults already filled in.
pub fn validate_node(node: &Node) -> Result<(), MonitorError> {
    validate_required(node)?;

    match node.kind {
        Some(ProtocolKind::Consensus) => validate_socket_endpoint(&node.endpoint)?,
        Some(ProtocolKind::Http) => validate_http_endpoint(&node.endpoint)?,
        // Full nodes may be addressed through the directory's RPC host/port,
        // and unknown kinds are reported as down by the probe instead.
        Some(ProtocolKind::FullNode) | Some(ProtocolKind::Unknown) | None => {}
    }

    validate_check_interval(node.check_interval)?;
    validate_timeout(node.timeout)?;

    if node.failure_threshold == 0 {
        return Err(invalid("failure threshold must be at least 1"));
    }

    Ok(())
}

/// Expected format: host:port
fn validate_socket_endpoint(endpoint: &str) -> Result<(), MonitorError> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| invalid(format!("endpoint must be in format host:port: {endpoint}")))?;

    if host.is_empty() {
        return Err(invalid(format!("endpoint has no host: {endpoint}")));
    }

    let port: u16 = port.parse().map_err(|_| invalid(format!("invalid port number: {port}")))?;
    validate_port(port)
}

fn validate_http_endpoint(endpoint: &str) -> Result<(), MonitorError> {
    let url = Url::parse(endpoint).map_err(|e| invalid(format!("invalid URL {endpoint}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("invalid scheme for HTTP node: {other}"))),
    }

    if url.host_str().is_none() {
        return Err(invalid(format!("URL has no host: {endpoint}")));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(())
}

fn validate_port(port: u16) -> Result<(), MonitorError> {
    if port == 0 {
        return Err(invalid("port 0 is not valid"));
    }
    Ok(())
}

fn validate_check_interval(interval: Duration) -> Result<(), MonitorError> {
    if interval.is_zero() {
        return Err(invalid("check interval must be greater than zero"));
    }
    if interval > MAX_INTERVAL {
        return Err(invalid(format!(
            "check interval too long: {}s (maximum: {}s)",
            interval.as_secs(),
            MAX_INTERVAL.as_secs()
        )));
    }
    Ok(())
}

fn validate_timeout(timeout: Duration) -> Result<(), MonitorError> {
    if timeout.is_zero() {
        return Err(invalid("timeout must be greater than zero"));
    }
    if timeout > MAX_TIMEOUT {
        return Err(invalid(format!(
            "timeout too long: {}s (maximum: {}s)",
            timeout.as_secs(),
            MAX_TIMEOUT.as_secs()
        )));
    }
    Ok(())
}
