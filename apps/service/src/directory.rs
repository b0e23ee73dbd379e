//! Node directory backed by the service configuration.
//!
//! Certificate files are re-read on every resolve so rotated material is
//! picked up without a restart.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use nodewatch::{ConnectionInfo, DirectoryError, Node, NodeDirectory, NodeId, TlsMaterial};

use crate::config::{NodeEntry, TlsEntry};

pub struct FileDirectory {
    entries: HashMap<NodeId, NodeEntry>,
}

impl FileDirectory {
    pub fn new(entries: &[NodeEntry]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|entry| (NodeId::from(entry.id.as_str()), entry.clone()))
                .collect(),
        }
    }
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, DirectoryError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| DirectoryError::Material(format!("{}: {e}", path.display())))
}

async fn load_tls(tls: &TlsEntry) -> Result<TlsMaterial, DirectoryError> {
    let ca_pem = read_pem(&tls.ca_file).await?;
    let client_cert_pem = match &tls.client_cert_file {
        Some(path) => Some(read_pem(path).await?),
        None => None,
    };

    Ok(TlsMaterial {
        ca_pem,
        client_cert_pem,
        server_name: tls.server_name.clone(),
    })
}

#[async_trait]
impl NodeDirectory for FileDirectory {
    async fn resolve(&self, node: &Node) -> Result<ConnectionInfo, DirectoryError> {
        let entry = self
            .entries
            .get(&node.id)
            .ok_or_else(|| DirectoryError::UnknownNode(node.id.clone()))?;

        let mut info = ConnectionInfo::new(entry.endpoint.clone());
        if let Some(tls) = &entry.tls {
            info = info.with_tls(load_tls(tls).await?);
        }
        if let Some(rpc) = &entry.rpc {
            info = info.with_rpc(rpc.host.clone(), rpc.port);
        }
        Ok(info)
    }
}
