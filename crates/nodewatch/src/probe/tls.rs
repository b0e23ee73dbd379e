//! Handshake-only liveness check for consensus nodes.
//!
//! Consensus nodes expose nothing but a mutually authenticated gossip port,
//! so a completed TLS handshake is the health signal. No application data is
//! exchanged.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVersion};
use openssl::x509::X509;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::debug;

use super::{Probe, describe};
use crate::directory::{ConnectionInfo, TlsMaterial};
use crate::error::ProbeError;

pub struct TlsProbe;

#[async_trait]
impl Probe for TlsProbe {
    async fn check(&self, conn: &ConnectionInfo, _timeout: Duration) -> Result<(), ProbeError> {
        let material = conn.tls.as_ref().ok_or(ProbeError::MissingTlsMaterial)?;
        let connector = build_connector(material)?;
        let server_name = material
            .server_name
            .clone()
            .unwrap_or_else(|| host_of(&conn.endpoint).to_string());

        let tcp = TcpStream::connect(&conn.endpoint).await.map_err(|e| ProbeError::Connect {
            address: conn.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let ssl = connector
            .configure()
            .and_then(|config| config.into_ssl(&server_name))
            .map_err(|e| ProbeError::Tls(describe(&e)))?;
        let mut stream = SslStream::new(ssl, tcp).map_err(|e| ProbeError::Tls(describe(&e)))?;

        Pin::new(&mut stream)
            .connect()
            .await
            .map_err(|e| ProbeError::Handshake(describe(&e)))?;

        debug!(
            endpoint = %conn.endpoint,
            version = stream.ssl().version_str(),
            "TLS handshake completed"
        );

        // Best effort close_notify; the node is already known to be alive.
        let _ = stream.shutdown().await;
        Ok(())
    }
}

/// Client context trusting only the node's CA bundle, TLS 1.2 or newer, and
/// presenting the node's certificate chain when one is configured.
fn build_connector(material: &TlsMaterial) -> Result<SslConnector, ProbeError> {
    let tls_error = |e: openssl::error::ErrorStack| ProbeError::Tls(describe(&e));

    let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(tls_error)?;
    builder.set_min_proto_version(Some(SslVersion::TLS1_2)).map_err(tls_error)?;

    let ca_certs = X509::stack_from_pem(&material.ca_pem)
        .map_err(|e| ProbeError::Tls(format!("invalid CA bundle: {e}")))?;
    if ca_certs.is_empty() {
        return Err(ProbeError::Tls("CA bundle contains no certificates".to_string()));
    }
    for cert in ca_certs {
        builder.cert_store_mut().add_cert(cert).map_err(tls_error)?;
    }

    if let Some(chain_pem) = &material.client_cert_pem {
        let mut chain = X509::stack_from_pem(chain_pem)
            .map_err(|e| ProbeError::Tls(format!("invalid client certificate: {e}")))?
            .into_iter();
        if let Some(leaf) = chain.next() {
            builder.set_certificate(&leaf).map_err(tls_error)?;
        }
        for cert in chain {
            builder.add_extra_chain_cert(cert).map_err(tls_error)?;
        }
    }

    Ok(builder.build())
}

/// Host part of `host:port`, without IPv6 brackets.
fn host_of(endpoint: &str) -> &str {
    let host = match endpoint.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => endpoint,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}
