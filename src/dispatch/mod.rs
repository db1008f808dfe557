//! Notification jobs and the dispatch pipeline.

mod pipeline;
mod render;
mod types;

pub use pipeline::{DispatchPipeline, PipelineOptions};
pub use render::render;
pub use types::{Channel, DispatchOutcome, Job, JobBuilder, RenderedMessage};
