//! Per-job dispatch pipeline.
//!
//! Each invocation walks a fixed sequence: resolve recipient → preference
//! gate → resolve template → render → deliver. Any failure aborts the job
//! immediately; nothing in the pipeline retries, and delivery is only
//! attempted after all resolution has succeeded, so a reported failure
//! guarantees no partial delivery took place.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{DispatchError, Result};
use crate::metrics::{DELIVERIES_TOTAL, JOBS_TOTAL, JOB_DURATION_SECONDS};
use crate::provider::DeliveryProvider;
use crate::resolver::{RecipientResolver, TemplateResolver};

use super::render::render;
use super::types::{Channel, DispatchOutcome, Job, RenderedMessage};

/// Pipeline behavior knobs
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Email subject line, rendered with the job's variables
    pub email_subject: String,
    /// Push notification title, rendered with the job's variables
    pub push_title: String,
    /// Dry-run validate push tokens before attempting delivery
    pub validate_push_tokens: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            email_subject: "Notification".to_string(),
            push_title: "Notification".to_string(),
            validate_push_tokens: true,
        }
    }
}

/// Orchestrates one delivery attempt per job.
///
/// Stateless between invocations apart from the shared cache and the
/// per-operation breakers owned by the resolvers; safe to share across
/// concurrent jobs.
pub struct DispatchPipeline {
    recipients: RecipientResolver,
    templates: TemplateResolver,
    email: Arc<dyn DeliveryProvider>,
    push: Arc<dyn DeliveryProvider>,
    options: PipelineOptions,
}

impl DispatchPipeline {
    pub fn new(
        recipients: RecipientResolver,
        templates: TemplateResolver,
        email: Arc<dyn DeliveryProvider>,
        push: Arc<dyn DeliveryProvider>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            recipients,
            templates,
            email,
            push,
            options,
        }
    }

    fn provider_for(&self, channel: Channel) -> &Arc<dyn DeliveryProvider> {
        match channel {
            Channel::Email => &self.email,
            Channel::Push => &self.push,
        }
    }

    fn subject_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.options.email_subject,
            Channel::Push => &self.options.push_title,
        }
    }

    /// Process a single job to completion.
    #[tracing::instrument(
        name = "pipeline.process_job",
        skip(self, job),
        fields(
            correlation_id = %job.correlation_id,
            channel = %job.channel,
            recipient_id = %job.recipient_id,
            template_id = %job.template_id
        )
    )]
    pub async fn process_job(&self, job: &Job) -> Result<DispatchOutcome> {
        let started = Instant::now();
        let result = self.run(job).await;

        let channel = job.channel.as_str();
        let outcome_label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "failed",
        };
        JOBS_TOTAL
            .with_label_values(&[channel, outcome_label])
            .inc();
        JOB_DURATION_SECONDS
            .with_label_values(&[channel])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn run(&self, job: &Job) -> Result<DispatchOutcome> {
        let recipient = self.recipients.resolve(&job.recipient_id).await?;

        if !recipient.allows(job.channel.as_str()) {
            tracing::info!("Recipient opted out of channel, skipping delivery");
            return Ok(DispatchOutcome::Skipped);
        }

        let template = self.templates.resolve(&job.template_id).await?;

        // Rendering is pure and cannot fail
        let message = RenderedMessage {
            contact_address: recipient.contact_address,
            subject: render(self.subject_for(job.channel), &job.variables),
            body: render(&template.body, &job.variables),
        };

        let provider = self.provider_for(job.channel);

        if job.channel == Channel::Push
            && self.options.validate_push_tokens
            && !provider.validate_destination(&message.contact_address).await
        {
            return Err(DispatchError::InvalidDestination {
                reason: format!("push token rejected by provider for {}", job.recipient_id),
            });
        }

        match provider.deliver(&message).await {
            Ok(delivery_id) => {
                DELIVERIES_TOTAL
                    .with_label_values(&[job.channel.as_str(), "accepted"])
                    .inc();
                tracing::info!(delivery_id = %delivery_id, "Job completed");
                Ok(DispatchOutcome::Delivered { delivery_id })
            }
            Err(e) => {
                DELIVERIES_TOTAL
                    .with_label_values(&[job.channel.as_str(), "failed"])
                    .inc();
                Err(e)
            }
        }
    }
}
