//! Per-request context module
//!
//! [`RequestContext`] is created for each incoming request, threaded
//! through the middleware pipeline into the dispatched handler, and
//! dropped when the response is sent. It is never shared across requests;
//! shared resources (template set, database pool) are attached as cheap
//! clones of `Arc`-backed handles.

use std::collections::HashMap;
use std::sync::Arc;

use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method};
use sqlx::PgPool;

use crate::error::RequestError;
use crate::templates::TemplateSet;

/// Session state decoded from the session cookie.
///
/// A flat key/value bag serialized as `k=v&k2=v2` in the cookie value.
/// There is no server-side session store.
#[derive(Debug, Clone, Default)]
pub struct Session {
    values: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a cookie value into a session.
    pub fn decode(raw: &str) -> Self {
        let values = parse_pairs(raw);
        Self { values }
    }

    /// Encode the session back into a cookie value.
    pub fn encode(&self) -> String {
        let mut pairs: Vec<_> = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect();
        pairs.sort();
        pairs.join("&")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// The signed-in user id, if the session carries one.
    pub fn user_id(&self) -> Option<i64> {
        self.get("user_id").and_then(|raw| raw.parse().ok())
    }
}

/// The authenticated principal established by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
}

/// Per-request scoped data handed to middleware and handlers.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Named path parameters bound by the matched route.
    pub params: HashMap<String, String>,
    /// Collected request body; empty for bodiless requests.
    pub body: Bytes,
    /// Attached by the template middleware.
    pub templates: Option<Arc<TemplateSet>>,
    /// Attached by the database middleware.
    pub db: Option<PgPool>,
    /// Attached by the session middleware.
    pub session: Option<Session>,
    /// Established by the auth middleware.
    pub principal: Option<Principal>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: HashMap::new(),
            body: Bytes::new(),
            templates: None,
            db: None,
            session: None,
            principal: None,
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let mut ctx = Self::new(parts.method, parts.uri.path());
        ctx.headers = parts.headers;
        ctx.body = body;
        ctx
    }

    /// A named path parameter bound during route matching.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The value of a cookie from the `Cookie` header, if present.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.headers.get(hyper::header::COOKIE)?;
        let raw = header.to_str().ok()?;
        raw.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    /// Parse the body as a urlencoded form.
    pub fn form(&self) -> HashMap<String, String> {
        match std::str::from_utf8(&self.body) {
            Ok(raw) => parse_pairs(raw),
            Err(_) => HashMap::new(),
        }
    }

    /// Render a template from the attached set.
    pub fn render(
        &self,
        name: &str,
        vars: &HashMap<&str, String>,
    ) -> Result<String, RequestError> {
        let templates = self
            .templates
            .as_ref()
            .ok_or_else(|| RequestError::Internal("template set not attached".to_string()))?;
        templates.render(name, vars)
    }
}

/// Parse `k=v&k2=v2` pairs with minimal urlencoding support.
fn parse_pairs(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                let hex = &raw[i + 1..=i + 2];
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trip() {
        let mut session = Session::new();
        session.set("user_id", "42");
        session.set("name", "ada lovelace");

        let decoded = Session::decode(&session.encode());
        assert_eq!(decoded.user_id(), Some(42));
        assert_eq!(decoded.get("name"), Some("ada lovelace"));
    }

    #[test]
    fn session_without_user_id() {
        let session = Session::decode("theme=dark");
        assert_eq!(session.user_id(), None);
        assert_eq!(session.get("theme"), Some("dark"));
    }

    #[test]
    fn cookie_lookup() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.headers.insert(
            hyper::header::COOKIE,
            "theme=dark; coursebid_session=user_id%3D7"
                .parse()
                .expect("header value"),
        );
        assert_eq!(ctx.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(
            ctx.cookie("coursebid_session").as_deref(),
            Some("user_id%3D7")
        );
        assert_eq!(ctx.cookie("missing"), None);
    }

    #[test]
    fn form_parsing() {
        let mut ctx = RequestContext::new(Method::POST, "/signin");
        ctx.body = Bytes::from_static(b"email=ada%40example.com&password=pass+word");
        let form = ctx.form();
        assert_eq!(form.get("email").map(String::as_str), Some("ada@example.com"));
        assert_eq!(form.get("password").map(String::as_str), Some("pass word"));
    }

    #[test]
    fn render_without_templates_fails() {
        let ctx = RequestContext::new(Method::GET, "/");
        let err = ctx
            .render("index.html", &HashMap::new())
            .expect_err("no template set attached");
        assert!(matches!(err, RequestError::Internal(_)));
    }
}
