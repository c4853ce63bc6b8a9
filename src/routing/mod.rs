//! Routing module
//!
//! The route table: an ordered list of (method, path pattern, handler
//! name) triples, registered once at startup and immutable afterwards.
//! Matching is registration-order-stable: the first route whose method
//! and pattern both match wins, so more specific paths must be registered
//! before more general ones sharing a prefix.

mod pattern;

use std::collections::HashMap;

use hyper::Method;

use crate::error::StartupError;

pub use pattern::PathPattern;

/// A registered route bound to a named handler.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    /// Name resolved against the handler registry at bind time.
    pub handler: String,
}

/// Ordered route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Pattern syntax errors are fatal at startup.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: &str,
    ) -> Result<&mut Self, StartupError> {
        let pattern =
            PathPattern::parse(pattern).map_err(|reason| StartupError::RoutePattern {
                pattern: pattern.to_string(),
                reason,
            })?;
        self.routes.push(Route {
            method,
            pattern,
            handler: handler.to_string(),
        });
        Ok(self)
    }

    pub fn get(&mut self, pattern: &str, handler: &str) -> Result<&mut Self, StartupError> {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: &str) -> Result<&mut Self, StartupError> {
        self.route(Method::POST, pattern, handler)
    }

    /// First route in registration order matching method and path.
    pub fn match_route(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(&Route, HashMap<String, String>)> {
        self.routes.iter().find_map(|route| {
            if route.method != *method {
                return None;
            }
            route.pattern.matches(path).map(|params| (route, params))
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
