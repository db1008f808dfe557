mod settings;

pub use settings::{
    BreakerSettings, CacheSettings, EmailConfig, PushConfig, Settings, UpstreamConfig,
    WorkerConfig,
};
