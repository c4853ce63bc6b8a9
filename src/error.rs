//! Error taxonomy for the runtime.
//!
//! Startup errors are fatal: they abort the process before the listener
//! opens. Request errors are scoped to a single request and are always
//! recovered into an HTTP response by the dispatcher.

use thiserror::Error;

/// Fatal errors raised during the startup sequence.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("template error in '{file}': {reason}")]
    Template { file: String, reason: String },

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no handler named '{handler}' registered for route '{path}'")]
    HandlerNotFound { handler: String, path: String },

    #[error("invalid route pattern '{pattern}': {reason}")]
    RoutePattern { pattern: String, reason: String },

    #[error("invalid bind address '{addr}': {reason}")]
    Address { addr: String, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("lifecycle order violated: {0}")]
    Lifecycle(&'static str),
}

/// Recoverable, request-scoped handler failures.
///
/// The dispatcher converts these into a generic 500 response; they never
/// cross the request boundary.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("template '{0}' not found")]
    MissingTemplate(String),

    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}
