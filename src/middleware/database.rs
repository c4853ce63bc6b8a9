//! Database-attachment stage: hands the shared connection pool to the
//! request context. Must run before auth, which may query user records.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Middleware, Outcome};
use crate::context::RequestContext;

pub struct DatabaseMiddleware {
    pool: PgPool,
}

impl DatabaseMiddleware {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Middleware for DatabaseMiddleware {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Outcome {
        // PgPool is a cheap clone over a shared inner pool.
        ctx.db = Some(self.pool.clone());
        Outcome::Continue
    }
}
