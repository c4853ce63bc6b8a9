//! Template-injection stage: attaches the compiled template set to the
//! request context. Has no dependency on other stages, so it runs first.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Middleware, Outcome};
use crate::context::RequestContext;
use crate::templates::TemplateSet;

pub struct TemplateMiddleware {
    templates: Arc<TemplateSet>,
}

impl TemplateMiddleware {
    pub fn new(templates: Arc<TemplateSet>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Middleware for TemplateMiddleware {
    fn name(&self) -> &'static str {
        "templates"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        ctx.templates = Some(Arc::clone(&self.templates));
        Outcome::Continue
    }
}
