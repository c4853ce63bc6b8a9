//! Application lifecycle module
//!
//! [`Application`] owns the configuration, the shared database pool and
//! the compiled template set. Its operations have a mandatory call order,
//! each invoked exactly once before the server starts accepting:
//! `init` → `load_templates` → `connect_database` → serve → `close`.
//!
//! After startup the instance is shared behind an `Arc` and treated as
//! read-only; `close` is the only late mutation and is guarded by an
//! atomic flag so a second call is a no-op.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::StartupError;
use crate::templates::TemplateSet;

pub struct Application {
    pub config: Config,
    templates: Option<Arc<TemplateSet>>,
    db: Option<PgPool>,
    closed: AtomicBool,
}

impl Application {
    /// Parse configuration. Fatal if the file is missing or malformed.
    pub fn init(config_path: &str) -> Result<Self, StartupError> {
        let config = Config::load_from(config_path)?;
        info!(path = config_path, "configuration loaded");
        Ok(Self {
            config,
            templates: None,
            db: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Compile the template set from the configured directory.
    pub fn load_templates(&mut self) -> Result<(), StartupError> {
        let set = TemplateSet::load(Path::new(&self.config.template_path))?;
        info!(
            count = set.len(),
            dir = %self.config.template_path,
            "templates compiled"
        );
        self.templates = Some(Arc::new(set));
        Ok(())
    }

    /// Establish the shared database pool. Fatal on connection failure.
    pub async fn connect_database(&mut self) -> Result<(), StartupError> {
        let url = self.config.database.url();
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(&url)
            .await?;
        info!(
            host = %self.config.database.host,
            database = %self.config.database.name,
            "database connected"
        );
        self.db = Some(pool);
        Ok(())
    }

    pub fn templates(&self) -> Option<Arc<TemplateSet>> {
        self.templates.clone()
    }

    pub fn db(&self) -> Option<PgPool> {
        self.db.clone()
    }

    /// Release the database pool. Idempotent: the first call closes, any
    /// later call is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("application already closed; ignoring");
            return;
        }
        if let Some(pool) = &self.db {
            pool.close().await;
        }
        info!("application closed");
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn fixture(config: Config) -> Self {
        Self {
            config,
            templates: None,
            db: None,
            closed: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    use crate::config::{DatabaseConfig, ServerConfig};

    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            drain_timeout_secs: 1,
            static_bypass_pipeline: true,
        },
        database: DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "app".to_string(),
            password: "pw".to_string(),
            name: "coursebid".to_string(),
        },
        public_path: "public".to_string(),
        template_path: "templates".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent() {
        let app = Application::fixture(test_config());
        assert!(!app.is_closed());

        app.close().await;
        assert!(app.is_closed());

        // Second call must be a silent no-op, never a crash.
        app.close().await;
        assert!(app.is_closed());
    }

    #[test]
    fn resources_absent_before_lifecycle_steps() {
        let app = Application::fixture(test_config());
        assert!(app.templates().is_none());
        assert!(app.db().is_none());
    }

    #[test]
    fn init_fails_on_missing_config() {
        let result = Application::init("/nonexistent/coursebid.json");
        assert!(matches!(result, Err(StartupError::Config(_))));
    }
}
