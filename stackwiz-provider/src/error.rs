use serde::{Deserialize, Serialize};

/// Unified error type for all DNS provider operations.
///
/// Each variant includes a `provider` field identifying which provider produced the error,
/// plus variant-specific context. All variants are serializable for structured error reporting.
///
/// # Retry
///
/// Only [`RateLimited`](Self::RateLimited) is retried by the HTTP layer, and only up to the
/// configured attempt ceiling. Every other variant is surfaced to the caller immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum ProviderError {
    /// A network-level error occurred (DNS resolution failure, connection refused, etc.).
    NetworkError {
        /// Provider that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The provided credentials are invalid or expired.
    InvalidCredentials {
        /// Provider that produced the error.
        provider: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// A DNS record with the same name/type already exists.
    RecordExists {
        /// Provider that produced the error.
        provider: String,
        /// Name of the conflicting record.
        record_name: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The specified DNS record was not found.
    RecordNotFound {
        /// Provider that produced the error.
        provider: String,
        /// ID of the record that was not found.
        record_id: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// A request parameter is invalid (e.g., bad TTL value, malformed IP address).
    InvalidParameter {
        /// Provider that produced the error.
        provider: String,
        /// Name of the invalid parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// The requested DNS record type is not supported by this provider.
    UnsupportedRecordType {
        /// Provider that produced the error.
        provider: String,
        /// The unsupported record type string.
        record_type: String,
    },

    /// The API rate limit was still in effect after the last retry (HTTP 429).
    RateLimited {
        /// Provider that produced the error.
        provider: String,
        /// Wait time in seconds suggested by the last response, if any.
        retry_after: Option<u64>,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Body of the last response.
        raw_message: Option<String>,
    },

    /// The HTTP request timed out.
    Timeout {
        /// Provider that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// No zone managed by the account matches the requested domain.
    ZoneNotFound {
        /// Provider that produced the error.
        provider: String,
        /// Domain name that was looked up.
        domain: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// The token is valid but lacks permission for the requested operation.
    PermissionDenied {
        /// Provider that produced the error.
        provider: String,
        /// Original error message from the provider API, if available.
        raw_message: Option<String>,
    },

    /// Failed to parse the provider's API response.
    ParseError {
        /// Provider that produced the error.
        provider: String,
        /// Details about the parse failure.
        detail: String,
    },

    /// Failed to serialize a request body.
    SerializationError {
        /// Provider that produced the error.
        provider: String,
        /// Details about the serialization failure.
        detail: String,
    },

    /// Non-2xx, non-429 response that did not map to a more specific variant.
    ApiError {
        /// Provider that produced the error.
        provider: String,
        /// HTTP status code, when the failure came from an HTTP response.
        status: Option<u16>,
        /// Raw error code from the API, if available.
        raw_code: Option<String>,
        /// Raw error message or response body.
        raw_message: String,
    },
}

impl ProviderError {
    /// Whether this is an expected outcome (bad input, missing resource, ...), used to pick the
    /// log level.
    ///
    /// `true` means log at `warn`, `false` at `error`.
    /// **Keep in sync when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::RecordExists { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidParameter { .. }
                | Self::UnsupportedRecordType { .. }
                | Self::ZoneNotFound { .. }
                | Self::PermissionDenied { .. }
        )
    }

    /// Name of the provider that produced the error.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::NetworkError { provider, .. }
            | Self::InvalidCredentials { provider, .. }
            | Self::RecordExists { provider, .. }
            | Self::RecordNotFound { provider, .. }
            | Self::InvalidParameter { provider, .. }
            | Self::UnsupportedRecordType { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::ZoneNotFound { provider, .. }
            | Self::PermissionDenied { provider, .. }
            | Self::ParseError { provider, .. }
            | Self::SerializationError { provider, .. }
            | Self::ApiError { provider, .. } => provider,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { provider, detail } => {
                write!(f, "[{provider}] Network error: {detail}")
            }
            Self::InvalidCredentials {
                provider,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{provider}] Invalid credentials: {msg}")
                } else {
                    write!(f, "[{provider}] Invalid credentials")
                }
            }
            Self::RecordExists {
                provider,
                record_name,
                ..
            } => {
                write!(f, "[{provider}] Record '{record_name}' already exists")
            }
            Self::RecordNotFound {
                provider,
                record_id,
                ..
            } => {
                write!(f, "[{provider}] Record '{record_id}' not found")
            }
            Self::InvalidParameter {
                provider,
                param,
                detail,
            } => {
                write!(f, "[{provider}] Invalid parameter '{param}': {detail}")
            }
            Self::UnsupportedRecordType {
                provider,
                record_type,
            } => {
                write!(f, "[{provider}] Unsupported record type: {record_type}")
            }
            Self::RateLimited {
                provider,
                retry_after,
                attempts,
                ..
            } => {
                if let Some(secs) = retry_after {
                    write!(
                        f,
                        "[{provider}] Rate limited after {attempts} attempt(s) (retry after {secs}s)"
                    )
                } else {
                    write!(f, "[{provider}] Rate limited after {attempts} attempt(s)")
                }
            }
            Self::Timeout { provider, detail } => {
                write!(f, "[{provider}] Request timeout: {detail}")
            }
            Self::ZoneNotFound {
                provider,
                domain,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{provider}] No zone found for '{domain}': {msg}")
                } else {
                    write!(f, "[{provider}] No zone found for '{domain}'")
                }
            }
            Self::PermissionDenied {
                provider,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{provider}] Permission denied: {msg}")
                } else {
                    write!(f, "[{provider}] Permission denied")
                }
            }
            Self::ParseError { provider, detail } => {
                write!(f, "[{provider}] Parse error: {detail}")
            }
            Self::SerializationError { provider, detail } => {
                write!(f, "[{provider}] Serialization error: {detail}")
            }
            Self::ApiError {
                provider,
                status,
                raw_message,
                ..
            } => match status {
                Some(status) => write!(f, "[{provider}] HTTP {status}: {raw_message}"),
                None => write!(f, "[{provider}] {raw_message}"),
            },
        }
    }
}

impl std::error::Error for ProviderError {}

/// Convenience type alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
