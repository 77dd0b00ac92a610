pub mod accounts;
pub mod auth;
pub mod config;
pub mod enhance;
pub mod error;
pub mod ingest;
pub mod models;
pub mod oauth;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod routes;
pub mod security;
pub mod storage;

// Re-export commonly used items for tests / binaries
pub use config::AppConfig;
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
