//! Dispatch module
//!
//! Replaces the name-string-to-method reflection of a classic MVC setup
//! with an explicit registry: controllers register named async handler
//! functions, and the route table is bound against the registry once at
//! startup. A route naming a handler that was never registered is a fatal
//! startup error, discovered before the listener opens rather than on the
//! first request.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tracing::{debug, error};

use crate::context::RequestContext;
use crate::error::{RequestError, StartupError};
use crate::http;
use crate::routing::Router;

/// What a handler produces: a response payload or a request-scoped error.
pub type HandlerResult = Result<Response<Full<Bytes>>, RequestError>;

type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered handler: consume the request context, produce a result.
pub type HandlerFn = Arc<dyn Fn(RequestContext) -> HandlerFuture + Send + Sync>;

/// A controller contributes named handler operations to the registry.
pub trait Controller {
    fn register(&self, registry: &mut HandlerRegistry);
}

/// Named handler table populated by controllers at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler function under a name.
    pub fn add<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .insert(name.to_string(), Arc::new(move |ctx| Box::pin(handler(ctx))));
    }

    pub fn get(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

/// The route table bound to concrete handlers.
pub struct Dispatcher {
    router: Router,
    handlers: HashMap<String, HandlerFn>,
}

impl Dispatcher {
    /// Resolve every route's handler name against the registry.
    ///
    /// Fails fast with the name of the first missing handler and its
    /// route; binding happens before serving starts, never lazily.
    pub fn bind(router: Router, registry: &HandlerRegistry) -> Result<Self, StartupError> {
        let mut handlers = HashMap::new();
        for route in router.routes() {
            let handler =
                registry
                    .get(&route.handler)
                    .ok_or_else(|| StartupError::HandlerNotFound {
                        handler: route.handler.clone(),
                        path: route.pattern.as_str().to_string(),
                    })?;
            handlers.insert(route.handler.clone(), handler);
        }
        debug!(routes = router.routes().len(), "route table bound");
        Ok(Self { router, handlers })
    }

    /// Match and invoke. A route miss yields 404 without invoking any
    /// handler; a handler error is recovered into a generic 500.
    pub async fn dispatch(&self, mut ctx: RequestContext) -> Response<Full<Bytes>> {
        let Some((route, params)) = self.router.match_route(&ctx.method, &ctx.path) else {
            return http::build_404_response();
        };

        // Bind-time validation guarantees the lookup succeeds.
        let Some(handler) = self.handlers.get(&route.handler) else {
            error!(handler = %route.handler, "bound handler vanished from table");
            return http::build_500_response();
        };

        ctx.params = params;
        match handler(ctx).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    handler = %route.handler,
                    route = %route.pattern,
                    "handler failed: {e}"
                );
                http::build_500_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn ok_handler(_ctx: RequestContext) -> HandlerResult {
        Ok(http::build_html_response("ok".to_string()))
    }

    async fn failing_handler(_ctx: RequestContext) -> HandlerResult {
        Err(RequestError::Internal("boom".to_string()))
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.add("Index", ok_handler);
        registry.add("GetCourse", |ctx: RequestContext| async move {
            let short_name = ctx
                .param("short_name")
                .ok_or_else(|| RequestError::BadRequest("missing short_name".to_string()))?;
            Ok(http::build_html_response(format!("course {short_name}")))
        });
        registry.add("Broken", failing_handler);
        registry
    }

    #[test]
    fn binding_fails_on_missing_handler() {
        let mut router = Router::new();
        router
            .get("/v/:video_id", "OnlineVideo")
            .expect("valid route");

        let Err(err) = Dispatcher::bind(router, &registry()) else {
            panic!("binding must fail");
        };
        match err {
            StartupError::HandlerNotFound { handler, path } => {
                assert_eq!(handler, "OnlineVideo");
                assert_eq!(path, "/v/:video_id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn dispatch_binds_params_and_invokes() {
        let mut router = Router::new();
        router.get("/c/:short_name", "GetCourse").expect("valid route");
        let dispatcher = Dispatcher::bind(router, &registry()).expect("binds");

        let ctx = RequestContext::new(Method::GET, "/c/algebra101");
        let response = dispatcher.dispatch(ctx).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn route_miss_is_404() {
        let mut router = Router::new();
        router.get("/", "Index").expect("valid route");
        let dispatcher = Dispatcher::bind(router, &registry()).expect("binds");

        let ctx = RequestContext::new(Method::GET, "/nowhere");
        let response = dispatcher.dispatch(ctx).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn handler_error_is_recovered_to_500() {
        let mut router = Router::new();
        router.get("/broken", "Broken").expect("valid route");
        let dispatcher = Dispatcher::bind(router, &registry()).expect("binds");

        let ctx = RequestContext::new(Method::GET, "/broken");
        let response = dispatcher.dispatch(ctx).await;
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn closures_capturing_state_can_register() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        let captured = Arc::clone(&counter);
        registry.add("Count", move |_ctx: RequestContext| {
            let captured = Arc::clone(&captured);
            async move {
                captured.fetch_add(1, Ordering::SeqCst);
                Ok(http::build_html_response("counted".to_string()))
            }
        });

        let mut router = Router::new();
        router.get("/count", "Count").expect("valid route");
        let dispatcher = Dispatcher::bind(router, &registry).expect("binds");

        dispatcher.dispatch(RequestContext::new(Method::GET, "/count")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
