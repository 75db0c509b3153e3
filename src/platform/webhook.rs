use crate::alert::Messenger;
use crate::error::{MonitorError, MonitorResult, SendError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GatewayPayload<'a> {
    to: &'a str,
    body: &'a str,
}

/// SMS gateway reached over HTTP.
///
/// Each message is a `POST` of `{"to": ..., "body": ...}`. Any 2xx answer
/// counts as accepted; delivery is up to the gateway.
pub struct WebhookMessenger {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookMessenger {
    pub fn new(url: &str, token: Option<String>) -> MonitorResult<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| MonitorError::Config(format!("webhook url {}: {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("accident_alert/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            token,
        })
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), SendError> {
        let mut request = self.client.post(&self.url).json(&GatewayPayload {
            to: destination,
            body,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SendError::Transport("gateway timeout".to_string())
            } else {
                SendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            log::warn!("Gateway answered HTTP {} for {}", status.as_u16(), destination);
            Err(SendError::Rejected(format!("HTTP {}", status.as_u16())))
        }
    }
}
