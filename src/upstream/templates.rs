//! Template service client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

const OPERATION: &str = "template-lookup";

/// A message template as served by the template service.
///
/// The body may contain `{{key}}` placeholders for variable substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub body: String,
}

/// Lookup seam for the template service.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_template(&self, template_id: &str) -> Result<Template>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    data: TemplatePayload,
}

#[derive(Debug, Deserialize)]
struct TemplatePayload {
    #[serde(default)]
    content: String,
}

/// HTTP implementation against `GET {base}/api/v1/templates/{id}`.
pub struct HttpTemplateSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTemplateSource {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn fetch_template(&self, template_id: &str) -> Result<Template> {
        let url = format!(
            "{}/api/v1/templates/{}",
            self.base_url.trim_end_matches('/'),
            template_id
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
                message: format!("template service returned {} for {}", status, template_id),
            });
        }

        let envelope: DataEnvelope =
            response.json().await.map_err(|e| DispatchError::Upstream {
                operation: OPERATION,
                message: format!("malformed template response: {}", e),
            })?;

        Ok(Template {
            id: template_id.to_string(),
            body: envelope.data.content,
        })
    }
}
