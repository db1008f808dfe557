use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    pub email: EmailConfig,
    pub push: PushConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Base URLs for the recipient directory and template services.
///
/// Both are required; deserialization fails (and the process does not start)
/// when either is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub user_service_url: String,
    pub template_service_url: String,
}

/// Circuit breaker tuning shared by both upstream operation types.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerSettings {
    /// Per-call timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Failure percentage within the window that opens the circuit
    #[serde(default = "default_error_threshold_pct")]
    pub error_threshold_pct: u8,
    /// Minimum calls in the window before the percentage is evaluated
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u32,
    /// Rolling failure window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Cooldown before an open circuit admits a trial call, in milliseconds
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_error_threshold_pct() -> u8 {
    50
}

fn default_volume_threshold() -> u32 {
    5
}

fn default_window_ms() -> u64 {
    10_000
}

fn default_reset_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Backend selection: "memory" (default) or "redis"
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    /// Redis URL, required only for the redis backend
    #[serde(default)]
    pub url: Option<String>,
    /// TTL for cached recipient records in seconds
    #[serde(default = "default_recipient_ttl")]
    pub recipient_ttl_seconds: u64,
    /// TTL for cached template bodies in seconds
    #[serde(default = "default_template_ttl")]
    pub template_ttl_seconds: u64,
}

fn default_cache_backend() -> String {
    "memory".to_string()
}

fn default_recipient_ttl() -> u64 {
    300 // 5 minutes
}

fn default_template_ttl() -> u64 {
    600 // 10 minutes
}

/// Transactional email settings. Sender identity and API key are required.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    pub api_key: String,
    #[serde(default = "default_email_api_url")]
    pub api_url: String,
    /// Subject line, rendered with the job's variables
    #[serde(default = "default_email_subject")]
    pub subject: String,
}

fn default_email_api_url() -> String {
    "https://api.sendgrid.com/v3".to_string()
}

fn default_email_subject() -> String {
    "Notification".to_string()
}

/// Mobile push settings. Project id and API token are required.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    pub project_id: String,
    pub api_key: String,
    #[serde(default = "default_push_api_url")]
    pub api_url: String,
    /// Notification title, rendered with the job's variables
    #[serde(default = "default_push_title")]
    pub default_title: String,
    /// Dry-run validate device tokens before attempting delivery
    #[serde(default = "default_validate_tokens")]
    pub validate_tokens: bool,
}

fn default_push_api_url() -> String {
    "https://fcm.googleapis.com/v1".to_string()
}

fn default_push_title() -> String {
    "Notification".to_string()
}

fn default_validate_tokens() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of jobs processed concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    16
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // UPSTREAM__USER_SERVICE_URL, EMAIL__FROM, PUSH__API_KEY, etc.
            .add_source(Environment::default().separator("__").try_parsing(true));

        builder.build()?.try_deserialize()
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            error_threshold_pct: default_error_threshold_pct(),
            volume_threshold: default_volume_threshold(),
            window_ms: default_window_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            url: None,
            recipient_ttl_seconds: default_recipient_ttl(),
            template_ttl_seconds: default_template_ttl(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let breaker = BreakerSettings::default();
        assert_eq!(breaker.call_timeout_ms, 5_000);
        assert_eq!(breaker.error_threshold_pct, 50);
        assert_eq!(breaker.reset_timeout_ms, 30_000);

        let cache = CacheSettings::default();
        assert_eq!(cache.backend, "memory");
        assert_eq!(cache.recipient_ttl_seconds, 300);
    }

    #[test]
    fn test_missing_required_options_fail() {
        // No upstream URLs or provider credentials configured
        let result: Result<Settings, ConfigError> =
            Config::builder().build().unwrap().try_deserialize();
        assert!(result.is_err());
    }
}
