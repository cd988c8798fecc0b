//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export library error type
pub use stackwiz_provider::ProviderError;

use crate::types::ValidationReport;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Bad input that never reached an external system
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Stack specification rejected field by field
    #[error("Invalid stack configuration: {}", .0.summary())]
    InvalidStackSpec(ValidationReport),

    /// Stack directory already present
    #[error("Stack '{0}' already exists")]
    StackExists(String),

    /// A record with the same (name, type) is already in the zone
    #[error("DNS record {name} ({record_type}) already exists")]
    DuplicateRecord { name: String, record_type: String },

    /// Stack not found
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    /// Record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// No zone in the account covers the domain
    #[error("No DNS zone found for {0}")]
    ZoneNotFound(String),

    /// Record type cannot carry the proxy flag
    #[error("{record_type} record {name} cannot be proxied")]
    UnsupportedRecordType { name: String, record_type: String },

    /// Removal of a system stack without `force`
    #[error("'{0}' is a system stack; pass force to remove it")]
    ProtectedStack(String),

    /// Container runtime invocation failed
    #[error("`{command}` failed (exit code {}): {stderr}", .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ProcessFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// A bounded external call exceeded its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Every IP echo service failed
    #[error("Could not detect the server's public IP: {0}")]
    IpDetectionFailed(String),

    /// Missing credential, template or base directory; malformed settings
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Template could not be rendered
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// Provider error (converting from library)
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

/// Caller-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    ExternalProcess,
    ExternalApi,
    RateLimitExceeded,
    Configuration,
    Io,
    Timeout,
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.) is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ValidationError(_)
            | Self::InvalidStackSpec(_)
            | Self::StackExists(_)
            | Self::DuplicateRecord { .. }
            | Self::StackNotFound(_)
            | Self::RecordNotFound(_)
            | Self::ZoneNotFound(_)
            | Self::UnsupportedRecordType { .. }
            | Self::ProtectedStack(_)
            | Self::ConfigurationError(_) => true,
            Self::Provider(e) => e.is_expected(),
            _ => false,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError(_)
            | Self::InvalidStackSpec(_)
            | Self::UnsupportedRecordType { .. }
            | Self::ProtectedStack(_) => ErrorCategory::Validation,
            Self::StackExists(_) | Self::DuplicateRecord { .. } => ErrorCategory::Conflict,
            Self::StackNotFound(_) | Self::RecordNotFound(_) | Self::ZoneNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::ProcessFailed { .. } => ErrorCategory::ExternalProcess,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::IpDetectionFailed(_) => ErrorCategory::ExternalApi,
            Self::ConfigurationError(_) | Self::TemplateError(_) => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::Io,
            Self::Provider(e) => match e {
                ProviderError::RateLimited { .. } => ErrorCategory::RateLimitExceeded,
                ProviderError::Timeout { .. } => ErrorCategory::Timeout,
                ProviderError::RecordExists { .. } => ErrorCategory::Conflict,
                ProviderError::RecordNotFound { .. } | ProviderError::ZoneNotFound { .. } => {
                    ErrorCategory::NotFound
                }
                ProviderError::InvalidParameter { .. }
                | ProviderError::UnsupportedRecordType { .. } => ErrorCategory::Validation,
                ProviderError::InvalidCredentials { .. } => ErrorCategory::Configuration,
                _ => ErrorCategory::ExternalApi,
            },
        }
    }

    /// Variant name, as used in the `code` field of result envelopes
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "ValidationError",
            Self::InvalidStackSpec(_) => "InvalidStackSpec",
            Self::StackExists(_) => "StackExists",
            Self::DuplicateRecord { .. } => "DuplicateRecord",
            Self::StackNotFound(_) => "StackNotFound",
            Self::RecordNotFound(_) => "RecordNotFound",
            Self::ZoneNotFound(_) => "ZoneNotFound",
            Self::UnsupportedRecordType { .. } => "UnsupportedRecordType",
            Self::ProtectedStack(_) => "ProtectedStack",
            Self::ProcessFailed { .. } => "ProcessFailed",
            Self::Timeout { .. } => "Timeout",
            Self::IpDetectionFailed(_) => "IpDetectionFailed",
            Self::ConfigurationError(_) => "ConfigurationError",
            Self::TemplateError(_) => "TemplateError",
            Self::IoError(_) => "IoError",
            Self::Provider(_) => "Provider",
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
