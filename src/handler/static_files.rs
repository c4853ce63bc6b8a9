//! Static asset serving
//!
//! `/assets/*` plus a small fixed set of well-known files are served from
//! the configured public path, without going through the dispatcher.
//! Whether they also skip the middleware pipeline is decided by the
//! `static_bypass_pipeline` config policy, not here.

use std::path::{Path, PathBuf};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tokio::fs;
use tracing::warn;

use crate::config::Config;
use crate::http::{self, mime};

const ASSETS_PREFIX: &str = "/assets/";

/// Paths served directly from the public directory, never dispatched.
pub fn is_static_path(path: &str) -> bool {
    path.starts_with(ASSETS_PREFIX) || path == "/robots.txt" || path == "/favicon.ico"
}

/// Serve a static path, or 404 if it does not resolve to a real file.
pub async fn serve(config: &Config, path: &str) -> Response<Full<Bytes>> {
    let Some(file_path) = resolve(config, path) else {
        return http::build_404_response();
    };

    match load(Path::new(&config.public_path), &file_path).await {
        Some(data) => {
            let content_type = mime::get_content_type(
                file_path.extension().and_then(|ext| ext.to_str()),
            );
            http::build_file_response(data, content_type)
        }
        None => http::build_404_response(),
    }
}

fn resolve(config: &Config, path: &str) -> Option<PathBuf> {
    let public = Path::new(&config.public_path);
    match path {
        "/robots.txt" => Some(public.join("robots.txt")),
        "/favicon.ico" => Some(public.join("images").join("favicon.ico")),
        _ => {
            let relative = path.strip_prefix(ASSETS_PREFIX)?;
            // Scrub traversal segments before touching the filesystem.
            let clean = relative.replace("..", "");
            Some(public.join(clean.trim_start_matches('/')))
        }
    }
}

/// Read the file, refusing anything that escapes the public directory.
async fn load(public: &Path, file_path: &Path) -> Option<Vec<u8>> {
    let public_canonical = match public.canonicalize() {
        Ok(dir) => dir,
        Err(e) => {
            warn!(
                "public directory not found or inaccessible '{}': {e}",
                public.display()
            );
            return None;
        }
    };

    let file_canonical = file_path.canonicalize().ok()?;
    if !file_canonical.starts_with(&public_canonical) {
        warn!(
            "refusing to serve '{}' outside the public directory",
            file_path.display()
        );
        return None;
    }

    fs::read(&file_canonical).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_config;
    use std::fs as std_fs;

    fn fixture_public(tag: &str) -> (Config, PathBuf) {
        let dir =
            std::env::temp_dir().join(format!("coursebid-public-{tag}-{}", std::process::id()));
        std_fs::create_dir_all(dir.join("js")).expect("mkdir");
        std_fs::create_dir_all(dir.join("images")).expect("mkdir");
        std_fs::write(dir.join("robots.txt"), "User-agent: *\n").expect("write");
        std_fs::write(dir.join("js").join("app.js"), "console.log(1);").expect("write");
        std_fs::write(dir.join("images").join("favicon.ico"), [0u8; 4]).expect("write");

        let mut config = test_config();
        config.public_path = dir.to_string_lossy().into_owned();
        (config, dir)
    }

    #[test]
    fn static_path_detection() {
        assert!(is_static_path("/assets/js/app.js"));
        assert!(is_static_path("/robots.txt"));
        assert!(is_static_path("/favicon.ico"));
        assert!(!is_static_path("/c/algebra101"));
        assert!(!is_static_path("/assets"));
    }

    #[tokio::test]
    async fn serves_asset_with_content_type() {
        let (config, dir) = fixture_public("asset");
        let response = serve(&config, "/assets/js/app.js").await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("Content-Type").and_then(|v| v.to_str().ok()),
            Some("application/javascript")
        );
        std_fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn well_known_files_resolve() {
        let (config, dir) = fixture_public("known");
        assert_eq!(serve(&config, "/robots.txt").await.status(), 200);
        assert_eq!(serve(&config, "/favicon.ico").await.status(), 200);
        std_fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn missing_asset_is_404() {
        let (config, dir) = fixture_public("missing");
        assert_eq!(serve(&config, "/assets/js/missing.js").await.status(), 404);
        std_fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (config, dir) = fixture_public("traversal");
        let response = serve(&config, "/assets/../../etc/passwd").await;
        assert_eq!(response.status(), 404);
        std_fs::remove_dir_all(dir).ok();
    }
}
