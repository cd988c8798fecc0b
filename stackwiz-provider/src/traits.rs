use async_trait::async_trait;

use crate::error::{ProviderError, Result};
use crate::types::{
    CreateDnsRecordRequest, DnsRecord, PaginatedResponse, ProviderZone, RecordQueryParams,
};

/// Raw API error (internal)
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// Error code (format differs per provider)
    pub code: Option<String>,
    /// Original error message
    pub message: String,
    /// HTTP status of the response that carried the error
    pub status: Option<u16>,
}

impl RawApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Extra context used while mapping errors (internal)
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    /// Record name (for `RecordExists`)
    pub record_name: Option<String>,
    /// Record ID (for `RecordNotFound`)
    pub record_id: Option<String>,
    /// Domain (for `ZoneNotFound`)
    pub domain: Option<String>,
}

/// Maps raw provider API errors onto [`ProviderError`] (internal)
pub(crate) trait ProviderErrorMapper {
    /// Provider identifier
    fn provider_name(&self) -> &'static str;

    /// Map a raw API error onto the unified error type
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError;

    /// Shortcut: parse error
    fn parse_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::ParseError {
            provider: self.provider_name().to_string(),
            detail: detail.to_string(),
        }
    }

    /// Shortcut: unmapped error (fallback)
    fn unknown_error(&self, raw: RawApiError) -> ProviderError {
        ProviderError::ApiError {
            provider: self.provider_name().to_string(),
            status: raw.status,
            raw_code: raw.code,
            raw_message: raw.message,
        }
    }
}

/// DNS provider operations needed to keep a zone in sync with the stacks on a host.
///
/// Record names are fully qualified on both sides of this trait; converting to and from
/// zone-relative names is the caller's job.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Provider identifier
    fn id(&self) -> &'static str;

    /// Check the credentials against the remote API.
    ///
    /// `Ok(false)` means the provider answered and rejected them.
    async fn validate_credentials(&self) -> Result<bool>;

    /// Look up a zone by its exact apex name. `Ok(None)` when the account has no such zone.
    async fn find_zone(&self, name: &str) -> Result<Option<ProviderZone>>;

    /// One page of records in a zone.
    async fn list_records(
        &self,
        zone_id: &str,
        params: &RecordQueryParams,
    ) -> Result<PaginatedResponse<DnsRecord>>;

    /// Create a record.
    async fn create_record(&self, req: &CreateDnsRecordRequest) -> Result<DnsRecord>;

    /// Toggle the proxy flag on an existing record.
    async fn set_proxied(&self, zone_id: &str, record_id: &str, proxied: bool)
    -> Result<DnsRecord>;

    /// Delete a record.
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()>;
}
