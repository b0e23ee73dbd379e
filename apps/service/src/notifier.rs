use std::time::Duration;

use async_trait::async_trait;
use nodewatch::{Alert, DowntimeAlert, NotificationError, Notifier, RecoveryAlert};
use tracing::{info, warn};

/// Writes alerts to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_downtime_alert(&self, alert: &DowntimeAlert) -> Result<(), NotificationError> {
        warn!(
            node = %alert.node_id,
            endpoint = %alert.endpoint,
            failures = alert.consecutive_failures,
            error = alert.error.as_deref().unwrap_or("-"),
            "Node is down"
        );
        Ok(())
    }

    async fn send_recovery_alert(&self, alert: &RecoveryAlert) -> Result<(), NotificationError> {
        info!(
            node = %alert.node_id,
            endpoint = %alert.endpoint,
            downtime_secs = alert.downtime.as_secs(),
            "Node recovered"
        );
        Ok(())
    }
}

/// POSTs every alert as JSON to a single webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nodewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url: reqwest::Url::parse(url)? })
    }

    async fn post(&self, alert: &Alert) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(alert)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotificationError::Rejected(format!("webhook answered {status}")))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_downtime_alert(&self, alert: &DowntimeAlert) -> Result<(), NotificationError> {
        self.post(&Alert::Downtime(alert.clone())).await
    }

    async fn send_recovery_alert(&self, alert: &RecoveryAlert) -> Result<(), NotificationError> {
        self.post(&Alert::Recovery(alert.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodewatch::NodeId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn downtime() -> DowntimeAlert {
        DowntimeAlert {
            node_id: NodeId::from("peer0"),
            name: "Peer 0".to_string(),
            endpoint: "peer0.example.com:7051".to_string(),
            kind: None,
            down_since: None,
            last_seen_up: None,
            consecutive_failures: 3,
            error: Some("connection refused".to_string()),
        }
    }

    /// Accepts one request, hands back its raw text and answers with `status_line`.
    async fn webhook(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = String::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.push_str(&String::from_utf8_lossy(&buf[..n]));
                if n == 0 || request.contains('}') {
                    break;
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_webhook_posts_tagged_json() {
        let (url, server) = webhook("HTTP/1.1 200 OK").await;
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();

        notifier.send_downtime_alert(&downtime()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.contains(r#""type":"downtime""#));
        assert!(request.contains(r#""node_id":"peer0""#));
    }

    #[tokio::test]
    async fn test_webhook_rejection() {
        let (url, _server) = webhook("HTTP/1.1 500 Internal Server Error").await;
        let notifier = WebhookNotifier::new(&url, Duration::from_secs(5)).unwrap();

        let err = notifier.send_downtime_alert(&downtime()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send_downtime_alert(&downtime()).await.is_ok());
    }

    #[test]
    fn test_invalid_url() {
        assert!(WebhookNotifier::new("not a url", Duration::from_secs(1)).is_err());
    }
}
