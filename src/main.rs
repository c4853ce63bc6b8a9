//! coursebid: a course marketplace web application.
//!
//! The binary wires the runtime together in the documented order: load
//! configuration, compile templates, connect the database, assemble the
//! middleware pipeline and the bound route table, then serve until a
//! termination signal triggers the graceful shutdown sequence.

mod app;
mod config;
mod context;
mod controllers;
mod dispatch;
mod error;
mod handler;
mod http;
mod middleware;
mod routing;
mod server;
mod templates;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::app::Application;
use crate::controllers::WebController;
use crate::dispatch::{Controller, Dispatcher, HandlerRegistry};
use crate::error::StartupError;
use crate::handler::ServiceState;
use crate::middleware::{
    AuthMiddleware, DatabaseMiddleware, Pipeline, SessionMiddleware, TemplateMiddleware,
};
use crate::routing::Router;
use crate::server::{spawn_signal_listener, GracefulServer};

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Path prefixes that require an authenticated principal.
const PROTECTED_PREFIXES: &[&str] = &[
    "/create",
    "/edit_profile",
    "/user_courses",
    "/participated_courses",
    "/bid",
    "/add_review",
    "/participate",
    "/logout",
];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = config_path_from_args(std::env::args());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to build async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &str) -> Result<(), StartupError> {
    // Lifecycle steps, in mandatory order, all before the listener opens.
    let mut app = Application::init(config_path)?;
    app.load_templates()?;
    app.connect_database().await?;
    let app = Arc::new(app);

    let templates = app
        .templates()
        .ok_or(StartupError::Lifecycle("templates must be loaded before serving"))?;
    let pool = app
        .db()
        .ok_or(StartupError::Lifecycle("database must be connected before serving"))?;

    let mut registry = HandlerRegistry::new();
    WebController.register(&mut registry);

    // Route table. First registered wins on overlap, so specific paths
    // come before general ones sharing a prefix.
    let mut router = Router::new();
    router
        .get("/", "Index")?
        .get("/signin", "SignIn")?
        .post("/signin", "SignInPost")?
        .get("/signup", "SignUp")?
        .post("/signup", "SignUpPost")?
        .get("/logout", "Logout")?
        .get("/create", "CreateCourse")?
        .post("/create", "CreateCoursePost")?
        .get("/u/:user_id", "GetUser")?
        .get("/c/:short_name", "GetCourse")?
        .get("/user_courses", "GetCreatedCourses")?
        .get("/participated_courses", "GetParticipatedCourses")?
        .get("/edit_profile", "GetUserProfile")?
        .post("/edit_profile", "SaveUserProfile")?
        .post("/bid", "BidCoursePost")?
        .post("/add_review", "AppendReviewPost")?
        .post("/participate", "ParticipatePost")?;

    // Fails fast on any route naming an unregistered handler.
    let dispatcher = Dispatcher::bind(router, &registry)?;

    // Stage order is a contract: session and database both before auth.
    let pipeline = Pipeline::builder()
        .add_last(TemplateMiddleware::new(templates))
        .add_last(SessionMiddleware::new())
        .add_last(DatabaseMiddleware::new(pool))
        .add_last(AuthMiddleware::new(PROTECTED_PREFIXES, "/signin"))
        .build();

    let service = Arc::new(ServiceState {
        app: Arc::clone(&app),
        pipeline,
        dispatcher,
    });

    let mut graceful = GracefulServer::new(
        app.config.socket_addr()?,
        app.config.server.drain_timeout(),
    );
    spawn_signal_listener(graceful.shutdown_handle());

    let app_for_close = Arc::clone(&app);
    graceful.add_shutdown_hook("close application", move || async move {
        app_for_close.close().await;
    });

    graceful.serve(service).await
}

/// Resolve the configuration path from the command line.
///
/// Accepts `--config <path>`, `-c <path>` and `--config=<path>`; the last
/// occurrence wins. Defaults to `config.json`.
fn config_path_from_args(args: impl Iterator<Item = String>) -> String {
    let mut args = args.skip(1);
    let mut path = DEFAULT_CONFIG_PATH.to_string();
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            if let Some(value) = args.next() {
                path = value;
            }
        } else if let Some(value) = arg.strip_prefix("--config=") {
            path = value.to_string();
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("coursebid".to_string())
            .chain(list.iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn default_config_path() {
        assert_eq!(config_path_from_args(args(&[])), "config.json");
    }

    #[test]
    fn explicit_config_flag() {
        assert_eq!(
            config_path_from_args(args(&["--config", "prod.json"])),
            "prod.json"
        );
        assert_eq!(config_path_from_args(args(&["-c", "dev.json"])), "dev.json");
        assert_eq!(
            config_path_from_args(args(&["--config=ci.json"])),
            "ci.json"
        );
    }

    #[test]
    fn dangling_flag_keeps_default() {
        assert_eq!(config_path_from_args(args(&["--config"])), "config.json");
    }

    #[tokio::test]
    async fn startup_aborts_on_missing_config() {
        // No listener is ever opened; the error surfaces before serving.
        let result = run("/nonexistent/coursebid-config.json").await;
        assert!(matches!(result, Err(StartupError::Config(_))));
    }
}
