//! Session-attachment stage: decodes the session cookie into the request
//! context. Must run before auth, which reads the decoded session.

use async_trait::async_trait;

use super::{Middleware, Outcome};
use crate::context::{RequestContext, Session};

/// Cookie carrying the serialized session.
pub const SESSION_COOKIE: &str = "coursebid_session";

pub struct SessionMiddleware {
    cookie_name: &'static str,
}

impl SessionMiddleware {
    pub fn new() -> Self {
        Self {
            cookie_name: SESSION_COOKIE,
        }
    }
}

impl Default for SessionMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        let session = match ctx.cookie(self.cookie_name) {
            Some(raw) => Session::decode(&raw),
            None => Session::new(),
        };
        ctx.session = Some(session);
        Outcome::Continue
    }
}
