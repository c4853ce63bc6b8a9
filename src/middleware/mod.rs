//! Middleware pipeline module
//!
//! An ordered, fixed list of per-request interceptors assembled once at
//! startup. Each stage either augments the [`RequestContext`] and passes
//! control on, or short-circuits with a response, in which case later
//! stages and the dispatcher never run.
//!
//! Stage order is a hard contract: session before auth (auth reads
//! session state) and database before auth (auth may verify the principal
//! against user records).

mod auth;
mod database;
mod session;
mod templates;

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tracing::{debug, trace};

use crate::context::RequestContext;

pub use auth::AuthMiddleware;
pub use database::DatabaseMiddleware;
pub use session::{SessionMiddleware, SESSION_COOKIE};
pub use templates::TemplateMiddleware;

/// Tagged result of a pipeline stage.
pub enum Outcome {
    /// Pass control to the next stage.
    Continue,
    /// Halt the chain and answer with this response.
    ShortCircuit(Response<Full<Bytes>>),
}

/// A single pipeline stage.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &mut RequestContext) -> Outcome;
}

/// The assembled pipeline. Stages run strictly sequentially, each at most
/// once per request, in the same order for every request.
pub struct Pipeline {
    stages: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Run every stage in order. Returns the short-circuit response, if
    /// any stage produced one.
    pub async fn run(&self, ctx: &mut RequestContext) -> Option<Response<Full<Bytes>>> {
        for stage in &self.stages {
            trace!(stage = stage.name(), "running middleware stage");
            match stage.handle(ctx).await {
                Outcome::Continue => {}
                Outcome::ShortCircuit(response) => {
                    debug!(
                        stage = stage.name(),
                        status = %response.status(),
                        "middleware short-circuited request"
                    );
                    return Some(response);
                }
            }
        }
        None
    }
}

pub struct PipelineBuilder {
    stages: Vec<Box<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn add_last<M: Middleware + 'static>(mut self, stage: M) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
