//! HTTP response building module
//!
//! Builders for the response shapes the runtime produces, decoupled from
//! specific business logic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tracing::error;

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(404)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("404 Not Found")))
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            Response::new(Full::new(Bytes::from("404 Not Found")))
        })
}

/// Build 500 Internal Server Error response
///
/// Deliberately generic: handler failure details stay in the log, not in
/// the body sent to the client.
pub fn build_500_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(500)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("500 Internal Server Error")))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            Response::new(Full::new(Bytes::from("500 Internal Server Error")))
        })
}

/// Build 302 redirect response
pub fn build_redirect_response(target: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(302)
        .header("Location", target)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("Redirecting...")))
        .unwrap_or_else(|e| {
            log_build_error("302", &e);
            Response::new(Full::new(Bytes::from("Redirecting...")))
        })
}

/// Build generic HTML response
pub fn build_html_response(content: String) -> Response<Full<Bytes>> {
    let content_length = content.len();
    Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .body(Full::new(Bytes::from(content)))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 200 response with an explicit content type (static assets)
pub fn build_file_response(data: Vec<u8>, content_type: &'static str) -> Response<Full<Bytes>> {
    let content_length = data.len();
    Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .body(Full::new(Bytes::from(data)))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Attach a `Set-Cookie` header to an existing response.
pub fn with_cookie(
    mut response: Response<Full<Bytes>>,
    name: &str,
    value: &str,
) -> Response<Full<Bytes>> {
    let cookie = format!("{name}={value}; Path=/; HttpOnly");
    match cookie.parse() {
        Ok(header_value) => {
            response
                .headers_mut()
                .append(hyper::header::SET_COOKIE, header_value);
        }
        Err(e) => error!("failed to encode cookie '{name}': {e}"),
    }
    response
}

/// Attach a `Set-Cookie` header that expires the named cookie.
pub fn clear_cookie(mut response: Response<Full<Bytes>>, name: &str) -> Response<Full<Bytes>> {
    let cookie = format!("{name}=; Path=/; HttpOnly; Max-Age=0");
    match cookie.parse() {
        Ok(header_value) => {
            response
                .headers_mut()
                .append(hyper::header::SET_COOKIE, header_value);
        }
        Err(e) => error!("failed to encode expiring cookie '{name}': {e}"),
    }
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    error!("failed to build {status} response: {error}");
}
