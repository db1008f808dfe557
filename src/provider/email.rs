//! Transactional email provider (SendGrid-compatible v3 API).

use async_trait::async_trait;
use serde_json::json;

use crate::config::EmailConfig;
use crate::dispatch::{Channel, RenderedMessage};
use crate::error::{DispatchError, Result};

use super::DeliveryProvider;

/// Sends HTML email through a SendGrid-compatible `POST /mail/send`.
pub struct EmailProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailProvider {
    pub fn new(client: reqwest::Client, config: &EmailConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }

    fn build_payload(&self, message: &RenderedMessage) -> serde_json::Value {
        json!({
            "personalizations": [{
                "to": [{ "email": message.contact_address }]
            }],
            "from": { "email": self.from },
            "subject": message.subject,
            "content": [{
                "type": "text/html",
                "value": message.body
            }]
        })
    }
}

#[async_trait]
impl DeliveryProvider for EmailProvider {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn deliver(&self, message: &RenderedMessage) -> Result<String> {
        let url = format!("{}/mail/send", self.api_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(message))
            .send()
            .await
            .map_err(|e| DispatchError::DeliveryFailed {
                channel: "email",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            // Preserve the provider's raw rejection for the logs
            let raw = response.text().await.unwrap_or_default();
            return Err(DispatchError::DeliveryFailed {
                channel: "email",
                message: format!("provider returned {}: {}", status, raw),
            });
        }

        let delivery_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("accepted")
            .to_string();

        tracing::info!(to = %message.contact_address, "Email accepted by provider");
        Ok(delivery_id)
    }
}
