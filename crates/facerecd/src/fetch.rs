//! Photo download over HTTP.

use axum::body::Bytes;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("photo at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// Downloads photos, resolving relative paths against the public API URL.
pub struct PhotoFetcher {
    client: reqwest::Client,
    public_api_url: String,
    /// Largest accepted photo, in bytes.
    max_bytes: usize,
}

impl PhotoFetcher {
    pub fn new(public_api_url: impl Into<String>, timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("facerecd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            public_api_url: public_api_url.into(),
            max_bytes,
        })
    }

    /// Absolute URLs (anything starting with `http`) are used as is; other
    /// values are appended to the public API URL.
    pub fn resolve(&self, photo_url: &str) -> String {
        if photo_url.starts_with("http") {
            photo_url.to_string()
        } else {
            format!("{}{}", self.public_api_url, photo_url)
        }
    }

    /// GET the URL and return the body. Non-2xx statuses are errors, and so
    /// is a body longer than `max_bytes`, whether declared or streamed.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        let mut response = self.client.get(url).send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                return Err(too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(request_err)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, len = body.len(), "photo downloaded");
        Ok(Bytes::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LIMIT: usize = 1024;

    fn fetcher(base: &str) -> PhotoFetcher {
        PhotoFetcher::new(base, Duration::from_secs(5), LIMIT).unwrap()
    }

    async fn sized_server() -> String {
        let app = Router::new()
            .route("/small", get(|| async { vec![7u8; LIMIT] }))
            .route("/big", get(|| async { vec![7u8; LIMIT * 4] }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// One-shot server answering with a chunked body and no Content-Length.
    async fn chunked_server(chunks: usize, chunk_len: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();

            let mut response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
            for _ in 0..chunks {
                response.extend_from_slice(format!("{chunk_len:x}\r\n").as_bytes());
                response.extend(std::iter::repeat(7u8).take(chunk_len));
                response.extend_from_slice(b"\r\n");
            }
            response.extend_from_slice(b"0\r\n\r\n");
            let _ = socket.write_all(&response).await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_resolve_absolute_url_untouched() {
        let f = fetcher("http://api.local");
        assert_eq!(f.resolve("http://x/a.jpg"), "http://x/a.jpg");
        assert_eq!(f.resolve("https://x/a.jpg"), "https://x/a.jpg");
    }

    #[test]
    fn test_resolve_relative_url_prefixed() {
        let f = fetcher("http://api.local");
        assert_eq!(f.resolve("/uploads/a.jpg"), "http://api.local/uploads/a.jpg");
        assert_eq!(fetcher("").resolve("/uploads/a.jpg"), "/uploads/a.jpg");
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_request_error() {
        let err = fetcher("").fetch("/not-absolute.jpg").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn test_fetch_at_limit_succeeds() {
        let base = sized_server().await;
        let bytes = fetcher("").fetch(&format!("{base}/small")).await.unwrap();
        assert_eq!(bytes.len(), LIMIT);
    }

    #[tokio::test]
    async fn test_fetch_declared_oversized_body_rejected() {
        let base = sized_server().await;
        let err = fetcher("").fetch(&format!("{base}/big")).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: LIMIT, .. }));
    }

    #[tokio::test]
    async fn test_fetch_streamed_oversized_body_rejected() {
        let base = chunked_server(8, 256).await;
        let err = fetcher("").fetch(&format!("{base}/stream")).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_fetch_streamed_body_within_limit() {
        let base = chunked_server(2, 256).await;
        let bytes = fetcher("").fetch(&format!("{base}/stream")).await.unwrap();
        assert_eq!(bytes.len(), 512);
    }
}
