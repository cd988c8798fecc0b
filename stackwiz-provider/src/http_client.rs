//! Generic HTTP client tools
//!
//! Every provider call goes through an [`HttpTransport`] so the retry loop and response
//! handling can be exercised without a network.
//!
//! # design principles
//! - **Transport only moves bytes** - it never interprets status codes
//! - **Retry is narrow** - only HTTP 429 is retried, up to [`RetryPolicy::max_attempts`]
//! - **Bounded waits** - server-supplied `Retry-After` values are capped

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, Result};
use crate::utils::log_sanitizer::truncate_for_log;

/// HTTP method subset used by the provider APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// A request relative to the provider's API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path plus query string, e.g. `/zones?name=example.com`.
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Raw response as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// `Retry-After` header in seconds, when present and numeric.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single request. Implementations must not retry.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Default connect timeout (seconds)
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default request timeout (seconds)
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// [`HttpTransport`] backed by `reqwest`, authenticating with a bearer token.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    api_token: String,
    provider_name: &'static str,
}

impl ReqwestTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        provider_name: &'static str,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::NetworkError {
                provider: provider_name.to_string(),
                detail: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_token: api_token.into(),
            provider_name,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let provider_name = self.provider_name;
        let url = format!("{}{}", self.base_url, request.path);
        log::debug!("[{provider_name}] {} {url}", request.method.as_str());

        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token);
        if let Some(body) = &request.body {
            log::debug!(
                "[{provider_name}] Request Body: {}",
                truncate_for_log(&body.to_string())
            );
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: provider_name.to_string(),
                    detail: e.to_string(),
                }
            } else {
                ProviderError::NetworkError {
                    provider: provider_name.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        log::debug!("[{provider_name}] Response Status: {status}");

        // Extract Retry-After header (before consuming response body)
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError {
                provider: provider_name.to_string(),
                detail: format!("Failed to read response body: {e}"),
            })?;

        log::debug!("[{provider_name}] Response Body: {}", truncate_for_log(&body));

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Rate-limit retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait used when a 429 carries no usable `Retry-After`.
    pub default_wait: Duration,
    /// Upper bound for server-supplied waits.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

/// HTTP tool function set
pub struct HttpUtils;

impl HttpUtils {
    /// Sends a request, retrying the identical request while the provider answers 429.
    ///
    /// # Returns
    /// * `Ok(response)` - any non-429 response, successful or not; status interpretation is
    ///   left to the provider
    /// * `Err(ProviderError::RateLimited)` - still rate limited after `max_attempts`
    /// * `Err(_)` - transport failure, surfaced immediately
    pub async fn execute_with_retry(
        transport: &dyn HttpTransport,
        request: &ApiRequest,
        provider_name: &str,
        policy: RetryPolicy,
    ) -> Result<ApiResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let response = transport.send(request).await?;
            if response.status != 429 {
                return Ok(response);
            }

            if attempt >= max_attempts {
                log::warn!(
                    "[{provider_name}] Rate limited on {} {}, giving up after {attempt} attempt(s)",
                    request.method.as_str(),
                    request.path
                );
                return Err(ProviderError::RateLimited {
                    provider: provider_name.to_string(),
                    retry_after: response.retry_after,
                    attempts: attempt,
                    raw_message: Some(response.body),
                });
            }

            let delay = retry_delay(response.retry_after, &policy);
            log::warn!(
                "[{}] Rate limited (attempt {}/{}), retrying in {:.1}s",
                provider_name,
                attempt,
                max_attempts,
                delay.as_secs_f32()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Parse JSON response
    ///
    /// # Returns
    /// * `Ok(T)` - successfully parsed
    /// * `Err(ProviderError::ParseError)` - parsing failed
    pub fn parse_json<T>(response_text: &str, provider_name: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(response_text).map_err(|e| {
            log::error!("[{provider_name}] JSON parse failed: {e}");
            log::error!(
                "[{provider_name}] Raw response: {}",
                truncate_for_log(response_text)
            );
            ProviderError::ParseError {
                provider: provider_name.to_string(),
                detail: e.to_string(),
            }
        })
    }
}

/// Server-supplied wait (capped) or the policy default.
fn retry_delay(retry_after: Option<u64>, policy: &RetryPolicy) -> Duration {
    match retry_after {
        Some(secs) => Duration::from_secs(secs).min(policy.max_wait),
        None => policy.default_wait,
    }
}
