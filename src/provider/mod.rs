//! Delivery providers.
//!
//! A provider takes a fully-resolved message and makes exactly one delivery
//! attempt against its transport; it never retries. Channel polymorphism is a
//! capability trait implemented independently per transport and selected by
//! the job's declared channel.

mod email;
mod push;

use async_trait::async_trait;

use crate::dispatch::{Channel, RenderedMessage};
use crate::error::Result;

pub use email::EmailProvider;
pub use push::PushProvider;

/// One-shot delivery capability for a single channel.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Channel this provider serves
    fn channel(&self) -> Channel;

    /// Attempt one delivery. Returns the provider-assigned delivery id on
    /// confirmed acceptance; any transport failure or rejection surfaces as
    /// `DeliveryFailed` with the provider's raw error preserved.
    async fn deliver(&self, message: &RenderedMessage) -> Result<String>;

    /// Non-delivering destination check. Returns `false` only on a
    /// provider-confirmed invalid destination; indeterminate errors answer
    /// `true` so a transient provider problem never suppresses delivery.
    async fn validate_destination(&self, _destination: &str) -> bool {
        true
    }
}
