mod settings;

pub use settings::{
    is_production, EmailProviderConfig, NegotiationConfig, NotificationConfig, OtelConfig, RetryBackoffConfig,
    ServerConfig, Settings,
};
