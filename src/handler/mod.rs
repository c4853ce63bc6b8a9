//! Request handling module
//!
//! Entry point for a single HTTP request: static-asset checks, the
//! middleware pipeline, then dispatch to the bound controller handler.
//! Every failure mode is recovered into a response here; nothing escapes
//! to crash the connection task.

pub mod static_files;

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use tracing::{info, warn};

use crate::app::Application;
use crate::context::RequestContext;
use crate::dispatch::Dispatcher;
use crate::middleware::Pipeline;

/// Shared per-process serving state, assembled once at startup.
pub struct ServiceState {
    pub app: Arc<Application>,
    pub pipeline: Pipeline,
    pub dispatcher: Dispatcher,
}

/// Handle one request end to end.
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServiceState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let is_static = static_files::is_static_path(&path);
    let bypass = state.app.config.server.static_bypass_pipeline;

    let response = if is_static && bypass {
        static_files::serve(&state.app.config, &path).await
    } else {
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("failed to read request body: {e}");
                Bytes::new()
            }
        };
        let mut ctx = RequestContext::from_parts(parts, body);

        if let Some(short_circuit) = state.pipeline.run(&mut ctx).await {
            short_circuit
        } else if is_static {
            // Bypass disabled by policy: assets still get the pipeline.
            static_files::serve(&state.app.config, &path).await
        } else {
            state.dispatcher.dispatch(ctx).await
        }
    };

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request served"
    );
    Ok(response)
}
