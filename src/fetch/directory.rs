//! Origin served from a local directory

use crate::error::{SwError, SwResult};
use crate::fetch::Fetcher;
use crate::http::{Request, Response, ResponseKind};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Serves same-origin requests from files under a site root
///
/// Directory URLs (`/app/`) map to `index.html`. Missing files produce a
/// 404 response the way a static file server would.
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn file_for(&self, request: &Request) -> PathBuf {
        let path = request.path().trim_start_matches('/');
        let mut file = self.root.join(path);
        if path.is_empty() || path.ends_with('/') {
            file.push("index.html");
        }
        file
    }
}

#[async_trait]
impl Fetcher for DirectoryFetcher {
    async fn fetch(&self, request: &Request) -> SwResult<Response> {
        if !request.is_same_origin() {
            return Err(SwError::network(
                &request.url,
                "cross-origin requests cannot be served from a directory origin",
            ));
        }
        if !matches!(request.method.as_str(), "GET" | "HEAD") {
            return Ok(Response::new(&request.url, 405, ResponseKind::Basic, vec![]));
        }

        let file = self.file_for(request);
        debug!("{} {} -> {}", request.method, request.url, file.display());

        let body = match fs::read(&file).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound || file.is_dir() => {
                return Ok(Response::new(
                    &request.url,
                    404,
                    ResponseKind::Basic,
                    b"Not Found".to_vec(),
                ));
            }
            Err(e) => {
                return Err(SwError::io(format!("reading {}", file.display()), e));
            }
        };

        let mut response = Response::new(&request.url, 200, ResponseKind::Basic, body);
        response
            .headers
            .push(("content-type".to_string(), content_type(&file).to_string()));
        response
            .headers
            .push(("content-length".to_string(), response.body.len().to_string()));
        if request.method == "HEAD" {
            response.body.clear();
        }
        Ok(response)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> (TempDir, DirectoryFetcher) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        std::fs::write(temp.path().join("app/index.html"), "<h1>app</h1>").unwrap();
        std::fs::write(temp.path().join("app/style.css"), "body{}").unwrap();
        let fetcher = DirectoryFetcher::new(temp.path().to_path_buf());
        (temp, fetcher)
    }

    #[tokio::test]
    async fn serves_files_and_indexes() {
        let (_temp, fetcher) = site();

        let index = fetcher.fetch(&Request::get("/app/").unwrap()).await.unwrap();
        assert_eq!(index.status, 200);
        assert_eq!(index.kind, ResponseKind::Basic);
        assert_eq!(index.body, b"<h1>app</h1>".to_vec());

        let css = fetcher
            .fetch(&Request::get("/app/style.css?v=1").unwrap())
            .await
            .unwrap();
        assert_eq!(css.header("content-type"), Some("text/css; charset=utf-8"));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let (_temp, fetcher) = site();
        let response = fetcher
            .fetch(&Request::get("/app/missing.js").unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn cross_origin_is_error() {
        let (_temp, fetcher) = site();
        let err = fetcher
            .fetch(&Request::get("https://cdn.test/x.js").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn head_has_no_body() {
        let (_temp, fetcher) = site();
        let response = fetcher
            .fetch(&Request::new("HEAD", "/app/style.css").unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert_eq!(response.header("content-length"), Some("6"));
    }
}
