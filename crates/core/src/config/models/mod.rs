pub mod api_observability;
pub mod app_config;
pub mod dispatcher;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, AuthConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use dispatcher::{RegistryConfig, SchedulerConfig, StatsConfig};
