//! # stackwiz-provider
//!
//! DNS provider client used by StackWiz to keep a zone's records in step with the stacks
//! running on a host.
//!
//! ## Supported Providers
//!
//! | Provider | Auth Method |
//! |----------|-------------|
//! | [Cloudflare](https://www.cloudflare.com/) | Bearer Token |
//!
//! ## Feature Flags
//!
//! - **`native-tls`** *(default)* — Use the platform's native TLS implementation.
//! - **`rustls`** — Use rustls. Recommended for static and cross-compiled builds.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stackwiz_provider::{create_provider, DnsProvider, ProviderCredentials, RecordQueryParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = create_provider(ProviderCredentials::Cloudflare {
//!         api_token: "your-token".to_string(),
//!     })?;
//!
//!     let Some(zone) = provider.find_zone("example.com").await? else {
//!         return Ok(());
//!     };
//!
//!     let records = provider
//!         .list_records(&zone.id, &RecordQueryParams::default())
//!         .await?;
//!     for record in &records.items {
//!         println!("{} {} -> {}", record.name, record.record_type, record.value);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Rate Limits
//!
//! Every request goes through [`HttpUtils::execute_with_retry`]: an HTTP 429 is retried after
//! the server's `Retry-After` (or a fixed default) up to [`RetryPolicy::max_attempts`], then
//! surfaces as [`ProviderError::RateLimited`]. Other error statuses are never retried.

mod error;
mod factory;
mod http_client;
mod providers;
mod traits;
mod types;
mod utils;

// Re-export error types
pub use error::{ProviderError, Result};

pub use factory::create_provider;

pub use http_client::{
    ApiRequest, ApiResponse, HttpMethod, HttpTransport, HttpUtils, ReqwestTransport, RetryPolicy,
};

// Re-export core trait only (internal traits are not exported)
pub use traits::DnsProvider;

pub use types::{
    CreateDnsRecordRequest, DnsRecord, DnsRecordType, PaginatedResponse, ProviderCredentials,
    ProviderType, ProviderZone, RecordQueryParams, ZoneStatus,
};

pub use providers::{
    CloudflareProvider, full_name_to_relative, normalize_domain_name, relative_to_full_name,
};

pub use utils::log_sanitizer;
