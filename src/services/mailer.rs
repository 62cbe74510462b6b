use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::NotificationKind;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail relay request failed")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected the notification: {0}")]
    Rejected(String),
}

/// Delivers order notifications. Template rendering and recipient lookup belong to the relay.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send_notification(&self, order_id: Uuid, kind: NotificationKind) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MailRequest<'a> {
    order_id: Uuid,
    email_type: &'a str,
}

/// Posts notifications as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpMailDispatcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMailDispatcher {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl MailDispatcher for HttpMailDispatcher {
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn send_notification(&self, order_id: Uuid, kind: NotificationKind) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.endpoint).json(&MailRequest {
            order_id,
            email_type: kind.as_str(),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {body}")));
        }

        tracing::info!(%order_id, kind = kind.as_str(), "notification sent");
        Ok(())
    }
}

/// Used when no relay is configured: notifications only show up in the logs.
#[derive(Debug, Clone, Default)]
pub struct LogMailDispatcher;

#[async_trait]
impl MailDispatcher for LogMailDispatcher {
    async fn send_notification(&self, order_id: Uuid, kind: NotificationKind) -> Result<(), NotifyError> {
        tracing::info!(%order_id, kind = kind.as_str(), "mail relay not configured, notification logged only");
        Ok(())
    }
}
