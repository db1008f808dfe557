use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use courier_dispatch::breaker::{BreakerConfig, CircuitBreaker};
use courier_dispatch::cache::create_cache_backend;
use courier_dispatch::config::Settings;
use courier_dispatch::dispatch::{DispatchPipeline, PipelineOptions};
use courier_dispatch::provider::{EmailProvider, PushProvider};
use courier_dispatch::resolver::{RecipientResolver, TemplateResolver};
use courier_dispatch::source::{channel_source, JobConsumer};
use courier_dispatch::upstream::{HttpRecipientDirectory, HttpTemplateSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration; missing required options abort startup here
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Shared HTTP client for upstreams and providers
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(settings.breaker.call_timeout_ms * 2))
        .build()?;

    let cache = create_cache_backend(&settings.cache).await;
    let breaker_config = BreakerConfig::from(&settings.breaker);

    let recipients = RecipientResolver::new(
        cache.clone(),
        CircuitBreaker::new("recipient-lookup", breaker_config.clone()),
        Arc::new(HttpRecipientDirectory::new(
            http.clone(),
            settings.upstream.user_service_url.clone(),
        )),
        Duration::from_secs(settings.cache.recipient_ttl_seconds),
    );

    let templates = TemplateResolver::new(
        cache.clone(),
        CircuitBreaker::new("template-lookup", breaker_config),
        Arc::new(HttpTemplateSource::new(
            http.clone(),
            settings.upstream.template_service_url.clone(),
        )),
        Duration::from_secs(settings.cache.template_ttl_seconds),
    );

    let pipeline = Arc::new(DispatchPipeline::new(
        recipients,
        templates,
        Arc::new(EmailProvider::new(http.clone(), &settings.email)),
        Arc::new(PushProvider::new(http, &settings.push)),
        PipelineOptions {
            email_subject: settings.email.subject.clone(),
            push_title: settings.push.default_title.clone(),
            validate_push_tokens: settings.push.validate_tokens,
        },
    ));
    tracing::info!("Dispatch pipeline initialized");

    // Ingress adapters (broker consumers, admin tools) submit through the
    // sender handle; the consumer drains the other end
    let (ingress, source) = channel_source(1024);
    let (shutdown_tx, _) = broadcast::channel(1);

    let consumer = Arc::new(JobConsumer::new(
        pipeline,
        settings.worker.max_in_flight,
    ));
    let consumer_task = consumer.clone();
    let shutdown_rx = shutdown_tx.subscribe();
    let consumer_handle = tokio::spawn(async move {
        consumer_task.run(source, shutdown_rx).await;
    });

    tracing::info!(
        max_in_flight = settings.worker.max_in_flight,
        "Job consumer running"
    );

    // Run until SIGINT/SIGTERM
    shutdown_signal().await;
    let _ = shutdown_tx.send(());
    drop(ingress);

    let _ = consumer_handle.await;

    let stats = consumer.stats();
    tracing::info!(
        processed = stats.processed,
        delivered = stats.delivered,
        skipped = stats.skipped,
        failed = stats.failed,
        "Dispatcher shutdown complete"
    );

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
