//! Mobile push provider (FCM-compatible HTTP v1 API).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::PushConfig;
use crate::dispatch::{Channel, RenderedMessage};
use crate::error::{DispatchError, Result};

use super::DeliveryProvider;

/// Error statuses the provider uses to report an invalid or unregistered
/// device token. Anything outside this set is treated as indeterminate.
const INVALID_TOKEN_STATUSES: [&str; 3] = ["INVALID_ARGUMENT", "UNREGISTERED", "NOT_FOUND"];

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Sends push notifications through an FCM-compatible `messages:send`.
pub struct PushProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    project_id: String,
}

impl PushProvider {
    pub fn new(client: reqwest::Client, config: &PushConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
        }
    }

    fn send_url(&self) -> String {
        format!(
            "{}/projects/{}/messages:send",
            self.api_url, self.project_id
        )
    }

    fn build_payload(&self, message: &RenderedMessage, validate_only: bool) -> serde_json::Value {
        let mut payload = json!({
            "message": {
                "token": message.contact_address,
                "notification": {
                    "title": message.subject,
                    "body": message.body
                },
                "android": {
                    "priority": "high",
                    "notification": {
                        "sound": "default",
                        "channel_id": "default"
                    }
                },
                "apns": {
                    "payload": {
                        "aps": {
                            "sound": "default",
                            "badge": 1
                        }
                    }
                },
                "webpush": {
                    "notification": {
                        "title": message.subject,
                        "body": message.body
                    }
                }
            }
        });

        if validate_only {
            payload["validate_only"] = json!(true);
        }

        payload
    }

    fn is_invalid_token_status(status: &str) -> bool {
        INVALID_TOKEN_STATUSES.contains(&status)
    }
}

#[async_trait]
impl DeliveryProvider for PushProvider {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn deliver(&self, message: &RenderedMessage) -> Result<String> {
        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(message, false))
            .send()
            .await
            .map_err(|e| DispatchError::DeliveryFailed {
                channel: "push",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(DispatchError::DeliveryFailed {
                channel: "push",
                message: format!("provider returned {}: {}", status, raw),
            });
        }

        let sent: SendResponse =
            response.json().await.map_err(|e| DispatchError::DeliveryFailed {
                channel: "push",
                message: format!("malformed provider response: {}", e),
            })?;

        tracing::info!(delivery_id = %sent.name, "Push notification accepted by provider");
        Ok(sent.name)
    }

    /// Dry-run the send to check the token without delivering.
    ///
    /// Only a provider-confirmed invalid/unregistered token answers `false`.
    /// Any other error class may be transient, and a false negative here
    /// would wrongly suppress delivery, so those answer `true`.
    async fn validate_destination(&self, destination: &str) -> bool {
        let probe = RenderedMessage {
            contact_address: destination.to_string(),
            subject: "Validation".to_string(),
            body: "Token validation".to_string(),
        };

        let response = match self
            .client
            .post(self.send_url())
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(&probe, true))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Token validation unreachable, assuming valid");
                return true;
            }
        };

        if response.status().is_success() {
            return true;
        }

        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) if Self::is_invalid_token_status(&envelope.error.status) => {
                tracing::warn!(
                    status = %envelope.error.status,
                    "Invalid push token detected"
                );
                false
            }
            Ok(envelope) => {
                tracing::warn!(
                    status = %envelope.error.status,
                    message = %envelope.error.message,
                    "Token validation inconclusive, assuming valid"
                );
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable validation error, assuming valid");
                true
            }
        }
    }
}
