// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure.
///
/// Loaded once at startup and never mutated while serving.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Directory that static assets are served from.
    pub public_path: String,
    /// Directory the template set is compiled from.
    pub template_path: String,
}

/// Server bind and shutdown configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on the drain phase during graceful shutdown, in seconds.
    pub drain_timeout_secs: u64,
    /// When true, `/assets/*` and the well-known files skip the middleware
    /// pipeline entirely. Inherited as unresolved behavior from the
    /// original routing setup, so it is a policy knob rather than a
    /// hardcoded assumption.
    pub static_bypass_pipeline: bool,
}

impl ServerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Database connection parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl DatabaseConfig {
    /// Connection URL in the form sqlx expects.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}
