//! Recipient directory client.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

const OPERATION: &str = "recipient-lookup";

/// A notification recipient as served by the directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Directory identifier
    pub id: String,
    /// Email address or push device token, depending on the channel
    pub contact_address: String,
    /// Per-channel opt-in flags, keyed by channel name
    #[serde(default)]
    pub preferences: HashMap<String, bool>,
}

impl Recipient {
    /// Whether this recipient accepts messages on the given channel.
    ///
    /// Only an explicitly-false preference opts out; an absent entry counts
    /// as accepting.
    pub fn allows(&self, channel: &str) -> bool {
        !matches!(self.preferences.get(channel), Some(false))
    }
}

/// Lookup seam for the directory service.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn fetch_recipient(&self, recipient_id: &str) -> Result<Recipient>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// HTTP implementation against `GET {base}/api/v1/users/{id}`.
pub struct HttpRecipientDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecipientDirectory {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl RecipientDirectory for HttpRecipientDirectory {
    async fn fetch_recipient(&self, recipient_id: &str) -> Result<Recipient> {
        let url = format!(
            "{}/api/v1/users/{}",
            self.base_url.trim_end_matches('/'),
            recipient_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DispatchError::Upstream {
                operation: OPERATION,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Upstream {
                operation: OPERATION,
                message: format!("directory returned {} for {}", status, recipient_id),
            });
        }

        let envelope: DataEnvelope<Recipient> =
            response.json().await.map_err(|e| DispatchError::Upstream {
                operation: OPERATION,
                message: format!("malformed directory response: {}", e),
            })?;

        Ok(envelope.data)
    }
}
