//! Seam to the external node directory, which owns node connection material.

use async_trait::async_trait;

use crate::error::DirectoryError;
use crate::node::Node;

/// TLS material for probing a consensus node.
#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    /// PEM encoded CA certificates used to validate the server certificate.
    pub ca_pem: Vec<u8>,
    /// PEM encoded client certificate chain, leaf first. No private key is
    /// needed: only the handshake itself is checked.
    pub client_cert_pem: Option<Vec<u8>>,
    /// Overrides the host used for SNI and hostname verification.
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcAddress {
    pub host: String,
    pub port: u16,
}

impl RpcAddress {
    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Live connection properties of a node, resolved once per check cycle.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    /// `host:port` or URL, as registered.
    pub endpoint: String,
    pub tls: Option<TlsMaterial>,
    pub rpc: Option<RpcAddress>,
}

impl ConnectionInfo {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Default::default() }
    }

    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_rpc(mut self, host: impl Into<String>, port: u16) -> Self {
        self.rpc = Some(RpcAddress { host: host.into(), port });
        self
    }
}

/// Resolves a node to its connection properties.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn resolve(&self, node: &Node) -> Result<ConnectionInfo, DirectoryError>;
}

/// Directory that only knows what is in the registration itself.
///
/// Enough for HTTP and full nodes addressed by URL; consensus nodes need a
/// directory that can supply TLS material.
pub struct EndpointDirectory;

#[async_trait]
impl NodeDirectory for EndpointDirectory {
    async fn resolve(&self, node: &Node) -> Result<ConnectionInfo, DirectoryError> {
        Ok(ConnectionInfo::new(node.endpoint.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url() {
        let rpc = RpcAddress { host: "10.0.0.5".into(), port: 8545 };
        assert_eq!(rpc.url(), "http://10.0.0.5:8545");

        let rpc = RpcAddress { host: "::1".into(), port: 8545 };
        assert_eq!(rpc.url(), "http://[::1]:8545");
    }
}
