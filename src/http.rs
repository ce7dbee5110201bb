//! HTTP plumbing shared by the Gemini, Ideogram and WordPress clients.
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

/// Cap on any response body we buffer (base64 images dominate).
pub const MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024; // 32MB

/// Cap on error bodies echoed back into status messages.
const MAX_ERROR_BODY: usize = 2 * 1024;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
}

/// Build the shared HTTP client.
///
/// `request_timeout` is the client-wide ceiling. Each call through
/// [`exchange`] also carries its own deadline covering headers and body.
pub fn build_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("listicle-studio/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(request_timeout)
        .build()
}

/// A fully read response.
#[derive(Debug)]
pub struct Reply {
    pub status: reqwest::StatusCode,
    pub body: Vec<u8>,
}

impl Reply {
    /// Text of the body, trimmed and truncated for display.
    pub fn error_text(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.len() <= MAX_ERROR_BODY {
            return text.to_string();
        }

        let mut cut = MAX_ERROR_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    }
}

/// Send a request and read its body, all within `timeout`.
///
/// Success bodies larger than [`MAX_RESPONSE_SIZE`] are an error. An error
/// body that cannot be read is reported as empty so the status still
/// reaches the caller.
pub async fn exchange(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Reply, HttpError> {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();
        let body = if status.is_success() {
            read_limited_bytes(response, MAX_RESPONSE_SIZE).await?
        } else {
            match read_limited_bytes(response, MAX_RESPONSE_SIZE).await {
                Ok(bytes) => bytes,
                Err(HttpError::Network(e)) if e.is_timeout() => {
                    return Err(HttpError::Timeout(timeout))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to read error response body");
                    Vec::new()
                }
            }
        };
        Ok::<_, HttpError>(Reply { status, body })
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Err(HttpError::Network(e))) if e.is_timeout() => Err(HttpError::Timeout(timeout)),
        Ok(result) => result,
        Err(_) => Err(HttpError::Timeout(timeout)),
    }
}

/// Read a response body, refusing anything larger than `limit` bytes.
pub async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, HttpError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(HttpError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(HttpError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(HttpError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// A server that sends response headers and part of the body, then stalls.
#[cfg(test)]
pub(crate) async fn spawn_stalled_server() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n{\"data\":",
                    )
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    format!("http://{}", addr)
}
