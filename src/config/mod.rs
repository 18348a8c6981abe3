/// Database configuration and connection management
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;

/// Secrets and credentials read from environment variables
pub mod secrets;

pub use settings::{AiSettings, LoadBalancing, RouterSettings, Settings, SkuSettings};
