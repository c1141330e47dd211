/// Database configuration and connection management
pub mod database;

/// Site, payment and account settings loaded from settings.toml
pub mod settings;
