use thiserror::Error;

/// Errors that can abort a notification job.
///
/// Every variant except `Config` is attributed to a single pipeline step and
/// propagates to the job consumer unchanged; cache misses are internal to the
/// resolvers and never surface here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Circuit open for {operation}")]
    CircuitOpen { operation: &'static str },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Upstream {operation} failed: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },

    #[error("Template content missing for template {template_id}")]
    TemplateContentMissing { template_id: String },

    #[error("Invalid destination: {reason}")]
    InvalidDestination { reason: String },

    #[error("Delivery via {channel} failed: {message}")]
    DeliveryFailed { channel: &'static str, message: String },
}

impl DispatchError {
    /// Stable error code for structured logging.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Config(_) => "CONFIG_ERROR",
            DispatchError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            DispatchError::Timeout { .. } => "TIMEOUT",
            DispatchError::Upstream { .. } => "UPSTREAM_ERROR",
            DispatchError::TemplateContentMissing { .. } => "TEMPLATE_CONTENT_MISSING",
            DispatchError::InvalidDestination { .. } => "INVALID_DESTINATION",
            DispatchError::DeliveryFailed { .. } => "DELIVERY_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = DispatchError::CircuitOpen {
            operation: "recipient-directory",
        };
        assert_eq!(err.code(), "CIRCUIT_OPEN");
        assert_eq!(err.to_string(), "Circuit open for recipient-directory");

        let err = DispatchError::TemplateContentMissing {
            template_id: "welcome-v1".to_string(),
        };
        assert_eq!(err.code(), "TEMPLATE_CONTENT_MISSING");
    }
}
