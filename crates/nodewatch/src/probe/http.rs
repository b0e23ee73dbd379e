use std::time::Duration;

use async_trait::async_trait;

use super::Probe;
use super::rpc::transport_error;
use crate::directory::ConnectionInfo;
use crate::error::ProbeError;

/// GET against the node's URL; any 2xx is healthy.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, conn: &ConnectionInfo, timeout: Duration) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&conn.endpoint)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::HttpStatus(status.as_u16()))
        }
    }
}
