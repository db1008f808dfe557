//! Cache-aside resolvers for recipients and templates.
//!
//! Each resolver owns one circuit breaker (one per upstream operation type)
//! and composes it with the shared cache: cache hit → return, miss → guarded
//! remote fetch → populate cache → return. Upstream failures propagate; cache
//! failures never do.

mod recipient;
mod template;

pub use recipient::RecipientResolver;
pub use template::TemplateResolver;

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::error::DispatchError;
use crate::metrics::BREAKER_REJECTED_TOTAL;

/// Map a breaker-level failure onto the dispatch error taxonomy.
fn map_breaker_error(breaker: &CircuitBreaker, err: BreakerError<DispatchError>) -> DispatchError {
    match err {
        BreakerError::Open => {
            BREAKER_REJECTED_TOTAL
                .with_label_values(&[breaker.name()])
                .inc();
            DispatchError::CircuitOpen {
                operation: breaker.name(),
            }
        }
        BreakerError::Timeout(timeout_ms) => DispatchError::Timeout {
            operation: breaker.name(),
            timeout_ms,
        },
        BreakerError::Inner(err) => err,
    }
}
