use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel for a notification job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Push,
}

impl Channel {
    /// Channel name as used in preference maps, metrics labels, and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification job, produced by an external source and consumed exactly
/// once by the pipeline. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Recipient to resolve in the directory service
    pub recipient_id: String,
    /// Template to resolve in the template service
    pub template_id: String,
    /// Delivery channel
    pub channel: Channel,
    /// Correlation id attached to every log line for this job
    pub correlation_id: String,
    /// Substitution variables for `{{key}}` placeholders
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Job {
    /// Create a builder for a job on the given channel
    pub fn builder(
        recipient_id: impl Into<String>,
        template_id: impl Into<String>,
        channel: Channel,
    ) -> JobBuilder {
        JobBuilder::new(recipient_id, template_id, channel)
    }
}

/// Builder for notification jobs
#[derive(Debug, Clone)]
pub struct JobBuilder {
    recipient_id: String,
    template_id: String,
    channel: Channel,
    correlation_id: Option<String>,
    variables: HashMap<String, String>,
}

impl JobBuilder {
    pub fn new(
        recipient_id: impl Into<String>,
        template_id: impl Into<String>,
        channel: Channel,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            template_id: template_id.into(),
            channel,
            correlation_id: None,
            variables: HashMap::new(),
        }
    }

    /// Set the correlation id (a random one is generated otherwise)
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add a single substitution variable
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Replace the substitution variables wholesale
    pub fn variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Build the job
    pub fn build(self) -> Job {
        Job {
            recipient_id: self.recipient_id,
            template_id: self.template_id,
            channel: self.channel,
            correlation_id: self
                .correlation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            variables: self.variables,
        }
    }
}

/// A fully-resolved message, constructed per job and discarded after the
/// delivery attempt.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    /// Email address or device token
    pub contact_address: String,
    /// Subject line (email) or notification title (push)
    pub subject: String,
    /// Rendered message body
    pub body: String,
}

/// Terminal outcome of a successful pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The provider accepted the message
    Delivered { delivery_id: String },
    /// The recipient opted out of the channel; nothing was sent
    Skipped,
}

impl DispatchOutcome {
    /// Outcome label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Delivered { .. } => "delivered",
            DispatchOutcome::Skipped => "skipped",
        }
    }
}
