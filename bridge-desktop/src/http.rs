//! Media downloads over `reqwest`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpResponse},
};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("reelplay/", env!("CARGO_PKG_VERSION"));

/// Whole-request deadline when the caller sets none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`HttpClient`] backed by a pooled `reqwest::Client` with rustls.
///
/// Performs no retries of its own; the playback core owns the retry policy.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client setup failed, using reqwest defaults");
                Client::new()
            });

        Self { client }
    }

    /// Wrap an already configured client (proxies, custom roots).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    let detail = e.without_url();
    if detail.is_timeout() {
        BridgeError::Network(format!("timed out: {}", detail))
    } else if detail.is_connect() {
        BridgeError::Network(format!("connect failed: {}", detail))
    } else {
        BridgeError::Network(detail.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            url,
            headers,
            timeout,
        } = request;

        let mut builder = self.client.get(&url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(transport_error)?;

        debug!(status, size = body.len(), "Media fetch finished");
        let mut response = HttpResponse::new(status, body);
        response.content_type = content_type;
        Ok(response)
    }
}
