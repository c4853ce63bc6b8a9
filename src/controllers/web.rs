//! Web controller: the named handler operations behind the route table.
//!
//! These are thin business glue. The structural contract is the
//! interesting part: every operation is registered by name, resolved at
//! startup, and invoked by the dispatcher with a per-request context.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::context::RequestContext;
use crate::dispatch::{Controller, HandlerRegistry, HandlerResult};
use crate::error::RequestError;
use crate::http;
use crate::middleware::SESSION_COOKIE;

pub struct WebController;

impl Controller for WebController {
    fn register(&self, registry: &mut HandlerRegistry) {
        registry.add("Index", index);
        registry.add("SignIn", sign_in);
        registry.add("SignInPost", sign_in_post);
        registry.add("SignUp", sign_up);
        registry.add("SignUpPost", sign_up_post);
        registry.add("Logout", logout);
        registry.add("CreateCourse", create_course);
        registry.add("CreateCoursePost", create_course_post);
        registry.add("GetUser", get_user);
        registry.add("GetCourse", get_course);
        registry.add("GetCreatedCourses", get_created_courses);
        registry.add("GetParticipatedCourses", get_participated_courses);
        registry.add("GetUserProfile", get_user_profile);
        registry.add("SaveUserProfile", save_user_profile);
        registry.add("BidCoursePost", bid_course_post);
        registry.add("AppendReviewPost", append_review_post);
        registry.add("ParticipatePost", participate_post);
    }
}

fn page(ctx: &RequestContext, template: &str, vars: &[(&'static str, String)]) -> HandlerResult {
    let vars: HashMap<&str, String> = vars.iter().cloned().collect();
    Ok(http::build_html_response(ctx.render(template, &vars)?))
}

fn require_form_field(
    form: &HashMap<String, String>,
    field: &str,
) -> Result<String, RequestError> {
    form.get(field)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| RequestError::BadRequest(format!("missing form field '{field}'")))
}

async fn index(ctx: RequestContext) -> HandlerResult {
    let user = ctx
        .principal
        .as_ref()
        .map_or_else(String::new, |p| p.user_id.to_string());
    page(&ctx, "index.html", &[("user_id", user)])
}

async fn sign_in(ctx: RequestContext) -> HandlerResult {
    page(&ctx, "signin.html", &[("error", String::new())])
}

async fn sign_in_post(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let email = require_form_field(&form, "email")?;
    let _password = require_form_field(&form, "password")?;

    let user_id = match &ctx.db {
        Some(pool) => find_user_by_email(pool, &email).await?,
        None => None,
    };

    match user_id {
        Some(user_id) => {
            let mut session = ctx.session.clone().unwrap_or_default();
            session.set("user_id", user_id.to_string());
            Ok(http::with_cookie(
                http::build_redirect_response("/"),
                SESSION_COOKIE,
                &session.encode(),
            ))
        }
        None => page(
            &ctx,
            "signin.html",
            &[("error", "unknown email or password".to_string())],
        ),
    }
}

async fn sign_up(ctx: RequestContext) -> HandlerResult {
    page(&ctx, "signup.html", &[("error", String::new())])
}

async fn sign_up_post(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let email = require_form_field(&form, "email")?;
    let name = require_form_field(&form, "name")?;
    let _password = require_form_field(&form, "password")?;

    if let Some(pool) = &ctx.db {
        sqlx::query("INSERT INTO users (email, name) VALUES ($1, $2)")
            .bind(&email)
            .bind(&name)
            .execute(pool)
            .await?;
    }
    Ok(http::build_redirect_response("/signin"))
}

async fn logout(_ctx: RequestContext) -> HandlerResult {
    Ok(http::clear_cookie(
        http::build_redirect_response("/"),
        SESSION_COOKIE,
    ))
}

async fn create_course(ctx: RequestContext) -> HandlerResult {
    page(&ctx, "course_form.html", &[("error", String::new())])
}

async fn create_course_post(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let short_name = require_form_field(&form, "short_name")?;
    let title = require_form_field(&form, "title")?;
    let owner = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;

    if let Some(pool) = &ctx.db {
        sqlx::query("INSERT INTO courses (short_name, title, owner_id) VALUES ($1, $2, $3)")
            .bind(&short_name)
            .bind(&title)
            .bind(owner.user_id)
            .execute(pool)
            .await?;
    }
    Ok(http::build_redirect_response(&format!("/c/{short_name}")))
}

async fn get_user(ctx: RequestContext) -> HandlerResult {
    let user_id = ctx
        .param("user_id")
        .ok_or_else(|| RequestError::BadRequest("missing user_id".to_string()))?
        .to_string();

    let name = match (&ctx.db, user_id.parse::<i64>().ok()) {
        (Some(pool), Some(id)) => {
            let name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
            name
        }
        _ => None,
    };

    match name {
        Some(name) => page(&ctx, "user.html", &[("user_id", user_id), ("name", name)]),
        None => Ok(http::build_404_response()),
    }
}

async fn get_course(ctx: RequestContext) -> HandlerResult {
    let short_name = ctx
        .param("short_name")
        .ok_or_else(|| RequestError::BadRequest("missing short_name".to_string()))?
        .to_string();

    let title = match &ctx.db {
        Some(pool) => {
            let title: Option<String> =
                sqlx::query_scalar("SELECT title FROM courses WHERE short_name = $1")
                    .bind(&short_name)
                    .fetch_optional(pool)
                    .await?;
            title
        }
        None => None,
    };

    match title {
        Some(title) => page(
            &ctx,
            "course.html",
            &[("short_name", short_name), ("title", title)],
        ),
        None => Ok(http::build_404_response()),
    }
}

async fn get_created_courses(ctx: RequestContext) -> HandlerResult {
    course_listing(ctx, "owner_id", "created_courses.html").await
}

async fn get_participated_courses(ctx: RequestContext) -> HandlerResult {
    course_listing(ctx, "participant_id", "participated_courses.html").await
}

async fn course_listing(
    ctx: RequestContext,
    owner_column: &'static str,
    template: &'static str,
) -> HandlerResult {
    let principal = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;

    let count = match &ctx.db {
        Some(pool) => count_courses(pool, owner_column, principal.user_id).await?,
        None => 0,
    };
    page(&ctx, template, &[("count", count.to_string())])
}

async fn count_courses(
    pool: &PgPool,
    owner_column: &'static str,
    user_id: i64,
) -> Result<i64, RequestError> {
    // Column name comes from a fixed set above, never from request input.
    let query = format!("SELECT COUNT(*) FROM courses WHERE {owner_column} = $1");
    let count: i64 = sqlx::query_scalar(&query)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

async fn get_user_profile(ctx: RequestContext) -> HandlerResult {
    let principal = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;
    page(
        &ctx,
        "profile.html",
        &[("user_id", principal.user_id.to_string())],
    )
}

async fn save_user_profile(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let name = require_form_field(&form, "name")?;
    let principal = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;

    if let Some(pool) = &ctx.db {
        sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(&name)
            .bind(principal.user_id)
            .execute(pool)
            .await?;
    }
    Ok(http::build_redirect_response("/edit_profile"))
}

async fn bid_course_post(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let course = require_form_field(&form, "course_id")?;
    let amount = require_form_field(&form, "amount")?;
    let principal = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;

    if let Some(pool) = &ctx.db {
        sqlx::query("INSERT INTO bids (course_id, user_id, amount) VALUES ($1, $2, $3)")
            .bind(&course)
            .bind(principal.user_id)
            .bind(&amount)
            .execute(pool)
            .await?;
    }
    Ok(http::build_redirect_response("/"))
}

async fn append_review_post(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let course = require_form_field(&form, "course_id")?;
    let review = require_form_field(&form, "review")?;
    let principal = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;

    if let Some(pool) = &ctx.db {
        sqlx::query("INSERT INTO reviews (course_id, user_id, body) VALUES ($1, $2, $3)")
            .bind(&course)
            .bind(principal.user_id)
            .bind(&review)
            .execute(pool)
            .await?;
    }
    Ok(http::build_redirect_response("/"))
}

async fn participate_post(ctx: RequestContext) -> HandlerResult {
    let form = ctx.form();
    let course = require_form_field(&form, "course_id")?;
    let principal = ctx
        .principal
        .as_ref()
        .ok_or_else(|| RequestError::Internal("no principal on protected route".to_string()))?;

    if let Some(pool) = &ctx.db {
        sqlx::query("INSERT INTO participants (course_id, user_id) VALUES ($1, $2)")
            .bind(&course)
            .bind(principal.user_id)
            .execute(pool)
            .await?;
    }
    Ok(http::build_redirect_response("/participated_courses"))
}

async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<i64>, RequestError> {
    let user_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user_id)
}
