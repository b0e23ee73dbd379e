//! JSON-RPC liveness check for full nodes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::{Value, json};

use super::{Probe, describe};
use crate::directory::ConnectionInfo;
use crate::error::ProbeError;

const HEALTH_METHOD: &str = "net_version";

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(rename = "jsonrpc")]
    _version: IgnoredAny,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Calls `net_version` and expects a non-empty result.
pub struct RpcProbe {
    client: reqwest::Client,
}

impl RpcProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn target_url(conn: &ConnectionInfo) -> String {
        match &conn.rpc {
            Some(rpc) => rpc.url(),
            None if conn.endpoint.contains("://") => conn.endpoint.clone(),
            None => format!("http://{}", conn.endpoint),
        }
    }
}

#[async_trait]
impl Probe for RpcProbe {
    async fn check(&self, conn: &ConnectionInfo, timeout: Duration) -> Result<(), ProbeError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": HEALTH_METHOD,
            "params": [],
            "id": 1,
        });

        let response = self
            .client
            .post(Self::target_url(conn))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let body = response.bytes().await.map_err(|e| transport_error(e, timeout))?;
        let envelope: RpcEnvelope =
            serde_json::from_slice(&body).map_err(|e| ProbeError::Decode(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(ProbeError::Rpc { code: error.code, message: error.message });
        }

        match envelope.result {
            None | Some(Value::Null) => Err(ProbeError::EmptyResult),
            Some(Value::String(result)) if result.is_empty() => Err(ProbeError::EmptyResult),
            Some(_) => Ok(()),
        }
    }
}

pub(super) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Http(describe(&error))
    }
}
