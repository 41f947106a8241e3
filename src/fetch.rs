//! HTTP client for source resources

use bytes::Bytes;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("connection timeout")]
    Timeout,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("write to local file failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Body and declared content type of a fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Bytes,
    /// Media type without parameters; empty when the server sent none
    pub mime_type: String,
}

/// Downloads the urls named in job commands and envelopes
#[derive(Clone)]
pub struct ResourceFetcher {
    client: Client,
}

impl ResourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url, "Starting fetch");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else if e.is_redirect() {
                FetchError::TooManyRedirects
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(response)
    }

    /// Fetch a whole resource into memory
    pub async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        let response = self.send(url).await?;
        let mime_type = content_type(&response);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::RequestFailed(format!("failed to read body: {e}")))?;

        debug!(url, size = bytes.len(), mime_type, "Fetch completed");

        Ok(FetchedResource { bytes, mime_type })
    }

    /// Stream a resource into `path`, returning the number of bytes written
    pub async fn fetch_to_file(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self.send(url).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::RequestFailed(format!("failed to read body: {e}")))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, size = written, path = %path.display(), "Fetch to file completed");

        Ok(written)
    }
}

fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{StatusCode, header};
    use axum::routing::get;
    use tempfile::TempDir;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fetcher() -> ResourceFetcher {
        ResourceFetcher::new(&FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_strips_mime_parameters() {
        let base = serve(Router::new().route(
            "/page",
            get(|| async { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], "<h1>x</h1>") }),
        ))
        .await;

        let resource = fetcher().fetch(&format!("{base}/page")).await.unwrap();
        assert_eq!(resource.mime_type, "text/html");
        assert_eq!(&resource.bytes[..], b"<h1>x</h1>");
    }

    #[tokio::test]
    async fn test_fetch_rejects_error_status() {
        let base = serve(Router::new().route(
            "/gone",
            get(|| async { StatusCode::NOT_FOUND }),
        ))
        .await;

        let err = fetcher().fetch(&format!("{base}/gone")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_to_file() {
        let base = serve(Router::new().route("/blob", get(|| async { vec![7u8; 4096] }))).await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");

        let written = fetcher()
            .fetch_to_file(&format!("{base}/blob"), &path)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&path).unwrap().len(), 4096);
    }
}
