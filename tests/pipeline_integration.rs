//! End-to-end pipeline tests.
//!
//! These tests run the real pipeline — resolvers, breakers, cache, renderer —
//! against in-memory fakes of the upstream services and delivery providers,
//! without any network setup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use courier_dispatch::breaker::{BreakerConfig, CircuitBreaker};
use courier_dispatch::cache::MemoryCacheBackend;
use courier_dispatch::dispatch::{
    Channel, DispatchOutcome, DispatchPipeline, Job, PipelineOptions, RenderedMessage,
};
use courier_dispatch::error::{DispatchError, Result};
use courier_dispatch::provider::DeliveryProvider;
use courier_dispatch::resolver::{RecipientResolver, TemplateResolver};
use courier_dispatch::source::{channel_source, JobConsumer};
use courier_dispatch::upstream::{Recipient, RecipientDirectory, Template, TemplateSource};

/// Directory fake serving one configurable recipient
struct FakeDirectory {
    recipient: Recipient,
    calls: AtomicU32,
    fail: bool,
}

impl FakeDirectory {
    fn serving(recipient: Recipient) -> Arc<Self> {
        Arc::new(Self {
            recipient,
            calls: AtomicU32::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            recipient: email_recipient(true),
            calls: AtomicU32::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecipientDirectory for FakeDirectory {
    async fn fetch_recipient(&self, _recipient_id: &str) -> Result<Recipient> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DispatchError::Upstream {
                operation: "recipient-lookup",
                message: "directory is down".to_string(),
            });
        }
        Ok(self.recipient.clone())
    }
}

/// Template-service fake serving one configurable body
struct FakeTemplates {
    body: String,
    calls: AtomicU32,
}

impl FakeTemplates {
    fn serving(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateSource for FakeTemplates {
    async fn fetch_template(&self, template_id: &str) -> Result<Template> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Template {
            id: template_id.to_string(),
            body: self.body.clone(),
        })
    }
}

/// Provider fake recording delivered messages
struct FakeProvider {
    channel: Channel,
    deliveries: Mutex<Vec<RenderedMessage>>,
    validations: AtomicU32,
    token_valid: bool,
    fail_delivery: bool,
}

impl FakeProvider {
    fn accepting(channel: Channel) -> Arc<Self> {
        Arc::new(Self::accepting_inner(channel))
    }

    fn rejecting_tokens(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            token_valid: false,
            ..Self::accepting_inner(channel)
        })
    }

    fn failing(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            fail_delivery: true,
            ..Self::accepting_inner(channel)
        })
    }

    fn accepting_inner(channel: Channel) -> Self {
        Self {
            channel,
            deliveries: Mutex::new(Vec::new()),
            validations: AtomicU32::new(0),
            token_valid: true,
            fail_delivery: false,
        }
    }

    fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    fn last_delivery(&self) -> Option<RenderedMessage> {
        self.deliveries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DeliveryProvider for FakeProvider {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn deliver(&self, message: &RenderedMessage) -> Result<String> {
        if self.fail_delivery {
            return Err(DispatchError::DeliveryFailed {
                channel: self.channel.as_str(),
                message: "provider rejected the message".to_string(),
            });
        }
        self.deliveries.lock().unwrap().push(message.clone());
        Ok(format!("msg-{}", self.delivery_count()))
    }

    async fn validate_destination(&self, _destination: &str) -> bool {
        self.validations.fetch_add(1, Ordering::SeqCst);
        self.token_valid
    }
}

fn email_recipient(opted_in: bool) -> Recipient {
    let mut preferences = HashMap::new();
    preferences.insert("email".to_string(), opted_in);
    Recipient {
        id: "u1".to_string(),
        contact_address: "ann@example.com".to_string(),
        preferences,
    }
}

fn push_recipient() -> Recipient {
    Recipient {
        id: "u1".to_string(),
        contact_address: "device-token-1".to_string(),
        preferences: HashMap::new(),
    }
}

fn build_pipeline(
    directory: Arc<FakeDirectory>,
    templates: Arc<FakeTemplates>,
    email: Arc<FakeProvider>,
    push: Arc<FakeProvider>,
    breaker_config: BreakerConfig,
) -> DispatchPipeline {
    let cache = Arc::new(MemoryCacheBackend::new());

    DispatchPipeline::new(
        RecipientResolver::new(
            cache.clone(),
            CircuitBreaker::new("recipient-lookup", breaker_config.clone()),
            directory,
            Duration::from_secs(300),
        ),
        TemplateResolver::new(
            cache,
            CircuitBreaker::new("template-lookup", breaker_config),
            templates,
            Duration::from_secs(600),
        ),
        email,
        push,
        PipelineOptions {
            email_subject: "Hello {{name}}".to_string(),
            push_title: "Notification".to_string(),
            validate_push_tokens: true,
        },
    )
}

fn email_job() -> Job {
    Job::builder("u1", "t1", Channel::Email)
        .correlation_id("req-1")
        .variable("name", "Ann")
        .build()
}

#[tokio::test]
async fn test_happy_path_renders_and_delivers_once() {
    let directory = FakeDirectory::serving(email_recipient(true));
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates,
        email.clone(),
        push,
        BreakerConfig::default(),
    );

    let outcome = pipeline.process_job(&email_job()).await.unwrap();

    assert!(matches!(outcome, DispatchOutcome::Delivered { .. }));
    assert_eq!(email.delivery_count(), 1);

    let message = email.last_delivery().unwrap();
    assert_eq!(message.contact_address, "ann@example.com");
    assert_eq!(message.body, "Hi Ann");
    assert_eq!(message.subject, "Hello Ann");
}

#[tokio::test]
async fn test_opted_out_recipient_skips_without_upstream_calls() {
    let directory = FakeDirectory::serving(email_recipient(false));
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates.clone(),
        email.clone(),
        push,
        BreakerConfig::default(),
    );

    let outcome = pipeline.process_job(&email_job()).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Skipped);
    assert_eq!(templates.calls(), 0);
    assert_eq!(email.delivery_count(), 0);
}

#[tokio::test]
async fn test_absent_preference_delivers() {
    let recipient = Recipient {
        id: "u1".to_string(),
        contact_address: "ann@example.com".to_string(),
        preferences: HashMap::new(),
    };
    let directory = FakeDirectory::serving(recipient);
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates,
        email.clone(),
        push,
        BreakerConfig::default(),
    );

    pipeline.process_job(&email_job()).await.unwrap();
    assert_eq!(email.delivery_count(), 1);
}

#[tokio::test]
async fn test_second_job_hits_cache() {
    let directory = FakeDirectory::serving(email_recipient(true));
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory.clone(),
        templates.clone(),
        email.clone(),
        push,
        BreakerConfig::default(),
    );

    pipeline.process_job(&email_job()).await.unwrap();
    pipeline.process_job(&email_job()).await.unwrap();

    // One upstream fetch each, two deliveries
    assert_eq!(directory.calls(), 1);
    assert_eq!(templates.calls(), 1);
    assert_eq!(email.delivery_count(), 2);
}

#[tokio::test]
async fn test_empty_template_content_fails_before_delivery() {
    let directory = FakeDirectory::serving(email_recipient(true));
    let templates = FakeTemplates::serving("");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates,
        email.clone(),
        push,
        BreakerConfig::default(),
    );

    let result = pipeline.process_job(&email_job()).await;

    assert!(matches!(
        result,
        Err(DispatchError::TemplateContentMissing { .. })
    ));
    assert_eq!(email.delivery_count(), 0);
}

#[tokio::test]
async fn test_invalid_push_token_fails_before_delivery() {
    let directory = FakeDirectory::serving(push_recipient());
    let templates = FakeTemplates::serving("Your order shipped");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::rejecting_tokens(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates,
        email,
        push.clone(),
        BreakerConfig::default(),
    );

    let job = Job::builder("u1", "t1", Channel::Push)
        .correlation_id("req-2")
        .build();
    let result = pipeline.process_job(&job).await;

    assert!(matches!(
        result,
        Err(DispatchError::InvalidDestination { .. })
    ));
    assert_eq!(push.validations.load(Ordering::SeqCst), 1);
    assert_eq!(push.delivery_count(), 0);
}

#[tokio::test]
async fn test_valid_push_token_delivers() {
    let directory = FakeDirectory::serving(push_recipient());
    let templates = FakeTemplates::serving("Your order shipped");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates,
        email,
        push.clone(),
        BreakerConfig::default(),
    );

    let job = Job::builder("u1", "t1", Channel::Push).build();
    let outcome = pipeline.process_job(&job).await.unwrap();

    assert!(matches!(outcome, DispatchOutcome::Delivered { .. }));
    assert_eq!(push.delivery_count(), 1);
    assert_eq!(
        push.last_delivery().unwrap().contact_address,
        "device-token-1"
    );
}

#[tokio::test]
async fn test_delivery_failure_propagates() {
    let directory = FakeDirectory::serving(email_recipient(true));
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::failing(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = build_pipeline(
        directory,
        templates,
        email,
        push,
        BreakerConfig::default(),
    );

    let result = pipeline.process_job(&email_job()).await;
    assert!(matches!(result, Err(DispatchError::DeliveryFailed { .. })));
}

#[tokio::test]
async fn test_open_breaker_fails_jobs_without_upstream_calls() {
    let directory = FakeDirectory::failing();
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);

    // Small volume floor so two failed jobs trip the breaker
    let breaker_config = BreakerConfig {
        volume_threshold: 2,
        reset_timeout: Duration::from_secs(60),
        ..BreakerConfig::default()
    };
    let pipeline = build_pipeline(
        directory.clone(),
        templates,
        email.clone(),
        push,
        breaker_config,
    );

    assert!(matches!(
        pipeline.process_job(&email_job()).await,
        Err(DispatchError::Upstream { .. })
    ));
    assert!(matches!(
        pipeline.process_job(&email_job()).await,
        Err(DispatchError::Upstream { .. })
    ));
    assert_eq!(directory.calls(), 2);

    // Circuit is now open: the job fails fast, the directory is not called
    assert!(matches!(
        pipeline.process_job(&email_job()).await,
        Err(DispatchError::CircuitOpen { .. })
    ));
    assert_eq!(directory.calls(), 2);
    assert_eq!(email.delivery_count(), 0);
}

#[tokio::test]
async fn test_consumer_drains_source_and_counts_outcomes() {
    let directory = FakeDirectory::serving(email_recipient(true));
    let templates = FakeTemplates::serving("Hi {{name}}");
    let email = FakeProvider::accepting(Channel::Email);
    let push = FakeProvider::accepting(Channel::Push);
    let pipeline = Arc::new(build_pipeline(
        directory,
        templates,
        email.clone(),
        push,
        BreakerConfig::default(),
    ));

    let (sender, source) = channel_source(16);
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let consumer = Arc::new(JobConsumer::new(pipeline, 4));

    for i in 0..5 {
        let job = Job::builder("u1", "t1", Channel::Email)
            .correlation_id(format!("req-{}", i))
            .variable("name", "Ann")
            .build();
        sender.submit(job).await.unwrap();
    }
    drop(sender); // Close the source so the consumer drains and returns

    let consumer_task = consumer.clone();
    let shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move { consumer_task.run(source, shutdown_rx).await })
        .await
        .unwrap();

    let stats = consumer.stats();
    assert_eq!(stats.processed, 5);
    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.failed, 0);
    assert_eq!(email.delivery_count(), 5);
}
