use crate::config::ClientConfig;
use crate::node::NodePool;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tsdeck::{ConsoleError, ErrorBody, Result};

pub const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// A response taken as-is from a single attempt.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Issues requests against a [`NodePool`], rotating to the next node and
/// retrying after each failed attempt.
///
/// `num_retries` counts attempts, not nodes: with `num_retries = 3` a request
/// makes at most four attempts, and a two-node pool sees one node twice. The
/// pool cursor moves only when another attempt follows.
#[derive(Debug)]
pub struct RequestExecutor {
    pool: NodePool,
    http_client: reqwest::Client,
    api_key: String,
    num_retries: u32,
    retry_interval: Duration,
}

impl RequestExecutor {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.connection_timeout()?)
            .build()
            .map_err(|e| ConsoleError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(RequestExecutor {
            pool: NodePool::new(config.nodes.clone())?,
            http_client,
            api_key: config.api_key.clone(),
            num_retries: config.num_retries,
            retry_interval: config.retry_interval()?,
        })
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    /// Run a request with retries and decode the 2xx body as `T`.
    ///
    /// A body that fails to decode is returned as [`ConsoleError::Decode`]
    /// without another attempt.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let text = self.execute_text(method.clone(), path, body).await?;
        serde_json::from_str(&text).map_err(|e| {
            ConsoleError::Decode(format!("Invalid response to {} {}: {}", method, path, e))
        })
    }

    /// Run a request with retries and return the 2xx body untouched.
    pub async fn execute_text(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<String> {
        let mut cursor = self.pool.snapshot();
        let mut attempt: u32 = 0;

        loop {
            let index = cursor.index();
            let url = cursor.node().url_for(path);
            tracing::debug!("[REQUEST {} {}] attempt {}", method, url, attempt + 1);

            match self.attempt(method.clone(), &url, body.as_deref()).await {
                Ok(text) => {
                    self.pool.record_success(index);
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= self.num_retries {
                        tracing::error!(
                            "[REQUEST {} {}] giving up after {} attempts: {}",
                            method,
                            path,
                            attempt + 1,
                            e
                        );
                        return Err(e);
                    }
                    attempt += 1;
                    self.pool.record_failure(index);
                    let next = cursor.rotate();
                    tracing::warn!(
                        "[REQUEST {} {}] attempt failed: {}; retrying on {} in {:?}",
                        method,
                        url,
                        e,
                        next,
                        self.retry_interval
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One direct call to the pool's current node: no retry, no rotation, and
    /// the status is returned to the caller uninterpreted.
    pub async fn send_once(
        &self,
        method: Method,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<RawResponse> {
        let url = self.pool.current().url_for(path);
        tracing::debug!("[REQUEST {} {}] single attempt", method, url);

        let response = self
            .http_client
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, &e))?;
        Ok(RawResponse { status, body })
    }

    async fn attempt(&self, method: Method, url: &str, body: Option<&[u8]>) -> Result<String> {
        let mut request = self
            .http_client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request.send().await.map_err(|e| transport_error(url, &e))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status, &text));
        }

        response
            .text()
            .await
            .map_err(|e| ConsoleError::Decode(format!("Failed to read response from {}: {}", url, e)))
    }
}

/// Prefer the service's `{message, http_code}` body; fall back to the status line.
pub fn parse_error_body(status: StatusCode, text: &str) -> ConsoleError {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => ConsoleError::Api {
            http_code: body.http_code.unwrap_or(status.as_u16()),
            message: body.message,
        },
        Err(_) => ConsoleError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        },
    }
}

pub fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

fn transport_error(url: &str, e: &reqwest::Error) -> ConsoleError {
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    ConsoleError::Transport {
        url: url.to_string(),
        message,
    }
}
