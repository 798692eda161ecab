//! Webhook notifications.
//!
//! Handles asynchronous dispatch of WAF alerts to external endpoints.

use crate::config::{Config, Result, WafError};
use crate::security::waf::{ThreatEvent, ThreatReporter};
use reqwest::Client;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

const SEVERITY_CRITICAL: u8 = 5;

/// Security event types for webhook notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WafBlock,
}

/// Webhook payload for security events.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub event_type: EventType,
    pub timestamp: i64,
    pub severity: u8,
    pub message: String,
}

impl WebhookPayload {
    fn from_event(event: &ThreatEvent<'_>) -> Self {
        Self {
            event_type: EventType::WafBlock,
            timestamp: i64::try_from(
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs(),
            )
            .unwrap_or(0),
            severity: SEVERITY_CRITICAL,
            message: format!(
                "[{}] {} {}",
                event.modules(),
                event.method,
                event.path
            ),
        }
    }
}

/// Posts a notification for every unsafe verdict.
pub struct WebhookReporter {
    client: Client,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
}

impl WebhookReporter {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url: config.webhook_url.clone(),
            webhook_token: config.webhook_token.clone(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Sends `payload` in the background. Outside a tokio runtime the
    /// notification is dropped.
    pub fn notify(&self, payload: WebhookPayload) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, webhook notification dropped");
            return;
        };

        let client = self.client.clone();
        let token = self.webhook_token.clone();
        runtime.spawn(async move {
            if let Err(e) = Self::send_notification(&client, &url, token.as_deref(), &payload).await
            {
                error!(error = %e, "Webhook notification failed");
            }
        });
    }

    async fn send_notification(
        client: &Client,
        url: &str,
        token: Option<&str>,
        payload: &WebhookPayload,
    ) -> Result<()> {
        let (tags, title) = match payload.event_type {
            EventType::WafBlock => ("shield,stop_sign", "WAF Block"),
        };

        let mut req = client
            .post(url)
            .header("Title", title)
            .header("Priority", payload.severity.to_string())
            .header("Tags", tags)
            .body(payload.message.clone());

        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {t}"));
        }

        req.send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| WafError::Webhook(e.to_string()))?;

        debug!(event_type = ?payload.event_type, "Webhook notification sent");
        Ok(())
    }
}

impl ThreatReporter for WebhookReporter {
    fn warn(&self, _event: &str, metadata: &ThreatEvent<'_>) {
        self.notify(WebhookPayload::from_event(metadata));
    }
}
