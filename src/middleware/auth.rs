//! Authentication stage.
//!
//! Reads the session attached by the session stage. On protected path
//! prefixes an unauthenticated request is short-circuited with a redirect
//! to the sign-in page; elsewhere the principal is attached when present
//! and the request continues either way.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::{Middleware, Outcome};
use crate::context::{Principal, RequestContext};
use crate::http;

pub struct AuthMiddleware {
    protected_prefixes: Vec<String>,
    signin_path: String,
}

impl AuthMiddleware {
    pub fn new(protected_prefixes: &[&str], signin_path: &str) -> Self {
        Self {
            protected_prefixes: protected_prefixes.iter().map(ToString::to_string).collect(),
            signin_path: signin_path.to_string(),
        }
    }

    fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes
            .iter()
            .any(|prefix| path == prefix || path.starts_with(&format!("{prefix}/")))
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        let user_id = ctx.session.as_ref().and_then(crate::context::Session::user_id);

        let principal = match user_id {
            Some(user_id) => {
                // The pool was attached by the database stage; when it is
                // there, verify the session still points at a real user.
                let verified = match &ctx.db {
                    Some(pool) => user_exists(pool, user_id).await,
                    None => true,
                };
                verified.then_some(Principal { user_id })
            }
            None => None,
        };

        if principal.is_none() && self.is_protected(&ctx.path) {
            debug!(path = %ctx.path, "unauthenticated request to protected path");
            return Outcome::ShortCircuit(http::build_redirect_response(&self.signin_path));
        }

        ctx.principal = principal;
        Outcome::Continue
    }
}

async fn user_exists(pool: &PgPool, user_id: i64) -> bool {
    let exists: Result<Option<i64>, sqlx::Error> =
        sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await;
    match exists {
        Ok(row) => row.is_some(),
        Err(e) => {
            warn!("session user lookup failed: {e}");
            false
        }
    }
}
