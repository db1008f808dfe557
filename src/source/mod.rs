//! Job ingestion.
//!
//! Jobs arrive one at a time through an abstract [`JobSource`]; how they got
//! there (broker, HTTP ingress, replay tool) is outside this crate. The
//! in-process channel implementation gives ingress adapters a cloneable
//! [`JobSender`] handle.

mod consumer;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::dispatch::Job;

pub use consumer::{ConsumerStatsSnapshot, JobConsumer};

/// Supplies jobs to the consumer, one at a time.
#[async_trait]
pub trait JobSource: Send {
    /// Next job, or `None` once the source is closed and drained.
    async fn next(&mut self) -> Option<Job>;
}

/// Error returned when submitting to a closed source.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("job source is closed")]
    Closed,
}

/// Cloneable handle for feeding jobs into a [`ChannelJobSource`].
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

impl JobSender {
    /// Submit a job, waiting for capacity if the channel is full.
    pub async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        self.tx.send(job).await.map_err(|_| SubmitError::Closed)
    }
}

/// In-process, channel-backed job source.
pub struct ChannelJobSource {
    rx: mpsc::Receiver<Job>,
}

#[async_trait]
impl JobSource for ChannelJobSource {
    async fn next(&mut self) -> Option<Job> {
        self.rx.recv().await
    }
}

/// Create a bounded channel source and its sender handle.
pub fn channel_source(capacity: usize) -> (JobSender, ChannelJobSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobSender { tx }, ChannelJobSource { rx })
}
