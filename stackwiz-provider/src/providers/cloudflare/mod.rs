//! Cloudflare DNS Provider

mod error;
mod http;
mod provider;
mod types;

use std::sync::Arc;

use crate::error::Result;
use crate::http_client::{HttpTransport, ReqwestTransport, RetryPolicy};

pub(crate) use types::{CloudflareDnsRecord, CloudflareResponse, CloudflareZone};

pub(crate) const CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";
/// Max records per page for the DNS records API
pub(crate) const MAX_PAGE_SIZE_RECORDS: u32 = 100;

/// Cloudflare DNS Provider
pub struct CloudflareProvider {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) retry: RetryPolicy,
}

impl CloudflareProvider {
    /// Provider talking to the public Cloudflare v4 API with a bearer token.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let transport = ReqwestTransport::new(CF_API_BASE, api_token, "cloudflare")?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Provider over a caller-supplied transport (tests, proxies).
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
