//! Concurrent job consumer.
//!
//! Pulls jobs from a [`JobSource`] and runs them through the pipeline with
//! bounded parallelism. The consumer is the pipeline's caller and therefore
//! owns the failure policy: a failed job is logged with its correlation id
//! and counted — the dead-letter point — never retried here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::dispatch::{DispatchOutcome, DispatchPipeline, Job};
use crate::error::Result;

use super::JobSource;

/// Counters for consumed jobs
#[derive(Debug, Default)]
struct ConsumerStats {
    processed: AtomicU64,
    delivered: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of consumer statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerStatsSnapshot {
    pub processed: u64,
    pub delivered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Runs jobs from a source through the pipeline.
pub struct JobConsumer {
    pipeline: Arc<DispatchPipeline>,
    max_in_flight: usize,
    stats: ConsumerStats,
}

impl JobConsumer {
    pub fn new(pipeline: Arc<DispatchPipeline>, max_in_flight: usize) -> Self {
        Self {
            pipeline,
            max_in_flight: max_in_flight.max(1),
            stats: ConsumerStats::default(),
        }
    }

    /// Get consumer statistics
    pub fn stats(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            processed: self.stats.processed.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Consume jobs until the source closes or a shutdown signal arrives.
    ///
    /// On shutdown, no further jobs are pulled; jobs already in flight are
    /// drained to completion. The pipeline persists no partial state, so
    /// nothing needs compensating.
    pub async fn run<S: JobSource>(&self, mut source: S, mut shutdown: broadcast::Receiver<()>) {
        let mut in_flight = FuturesUnordered::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(
                        in_flight = in_flight.len(),
                        "Shutdown signal received, draining in-flight jobs"
                    );
                    break;
                }
                maybe_job = source.next(), if in_flight.len() < self.max_in_flight => {
                    match maybe_job {
                        Some(job) => {
                            let pipeline = self.pipeline.clone();
                            in_flight.push(async move {
                                let result = pipeline.process_job(&job).await;
                                (job, result)
                            });
                        }
                        None => {
                            tracing::info!("Job source closed");
                            break;
                        }
                    }
                }
                Some((job, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.complete(&job, result);
                }
            }
        }

        while let Some((job, result)) = in_flight.next().await {
            self.complete(&job, result);
        }
    }

    fn complete(&self, job: &Job, result: Result<DispatchOutcome>) {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(DispatchOutcome::Delivered { delivery_id }) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    correlation_id = %job.correlation_id,
                    delivery_id = %delivery_id,
                    "Job delivered"
                );
            }
            Ok(DispatchOutcome::Skipped) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    correlation_id = %job.correlation_id,
                    "Job skipped, recipient opted out"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    correlation_id = %job.correlation_id,
                    code = e.code(),
                    error = %e,
                    "Job failed, handing to dead-letter policy"
                );
            }
        }
    }
}
