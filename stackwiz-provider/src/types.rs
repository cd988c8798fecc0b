use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Pagination ============

/// Query parameters for DNS record listing.
///
/// Pages are 1-indexed.
///
/// # Default
///
/// The default is `page = 1, page_size = 100`, with no name or type filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQueryParams {
    /// Page number (1-indexed).
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
    /// Exact fully-qualified record name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional record type filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<DnsRecordType>,
}

impl Default for RecordQueryParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 100,
            name: None,
            record_type: None,
        }
    }
}

impl RecordQueryParams {
    /// Same filters, different page.
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }
}

/// A paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items in the current page.
    pub items: Vec<T>,
    /// Current page number.
    pub page: u32,
    /// Page size used for this request.
    pub page_size: u32,
    /// Total number of items across all pages.
    pub total_count: u32,
    /// Whether there are more pages after this one.
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    /// Create a new paginated response, automatically computing [`has_more`](Self::has_more).
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: u32) -> Self {
        let has_more = page.saturating_mul(page_size) < total_count;
        Self {
            items,
            page,
            page_size,
            total_count,
            has_more,
        }
    }
}

// ============ Provider Types ============

/// Identifies which DNS provider implementation to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Cloudflare DNS.
    Cloudflare,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloudflare => write!(f, "cloudflare"),
        }
    }
}

/// Credentials for constructing a provider via [`create_provider`](crate::create_provider).
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderCredentials {
    /// Cloudflare API token with `Zone:Read` and `DNS:Edit`.
    Cloudflare { api_token: String },
}

impl ProviderCredentials {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Cloudflare { .. } => ProviderType::Cloudflare,
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloudflare { .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"***")
                .finish(),
        }
    }
}

// ============ Zone Types ============

/// Status of a zone within a DNS provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    /// Zone is active and resolving.
    Active,
    /// Zone moved away or paused.
    Paused,
    /// Zone is pending activation/verification.
    Pending,
    /// Status could not be determined.
    Unknown,
}

/// A zone managed by a DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderZone {
    /// Provider-specific zone identifier.
    pub id: String,
    /// Apex name (e.g., `"example.com"`).
    pub name: String,
    /// Current zone status.
    pub status: ZoneStatus,
}

// ============ DNS Record Types ============

/// DNS record type.
///
/// Serialized as uppercase strings (`"A"`, `"AAAA"`, `"CNAME"`, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    Aaaa,
    /// Canonical name (alias) record.
    Cname,
    /// Mail exchange record.
    Mx,
    /// Text record.
    Txt,
    /// Name server record.
    Ns,
    /// Service locator record.
    Srv,
    /// Certificate Authority Authorization record.
    Caa,
}

impl DnsRecordType {
    /// Uppercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Mx => "MX",
            Self::Txt => "TXT",
            Self::Ns => "NS",
            Self::Srv => "SRV",
            Self::Caa => "CAA",
        }
    }

    /// Whether the provider's proxy flag is meaningful for this type.
    pub fn supports_proxy(self) -> bool {
        matches!(self, Self::A | Self::Aaaa | Self::Cname)
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DnsRecordType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::Aaaa),
            "CNAME" => Ok(Self::Cname),
            "MX" => Ok(Self::Mx),
            "TXT" => Ok(Self::Txt),
            "NS" => Ok(Self::Ns),
            "SRV" => Ok(Self::Srv),
            "CAA" => Ok(Self::Caa),
            other => Err(format!("unsupported record type: {other}")),
        }
    }
}

/// A DNS record as stored by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    /// Provider-specific record identifier.
    pub id: String,
    /// Zone identifier this record belongs to.
    pub zone_id: String,
    /// Record type.
    pub record_type: DnsRecordType,
    /// Fully-qualified record name.
    pub name: String,
    /// Record content (IP literal, hostname or text).
    pub value: String,
    /// Time to live in seconds (`1` means provider-automatic).
    pub ttl: u32,
    /// MX priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    /// Whether the provider's proxy is enabled.
    pub proxied: bool,
    /// When the record was created, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last updated, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to create a new DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDnsRecordRequest {
    /// Target zone.
    pub zone_id: String,
    /// Fully-qualified record name.
    pub name: String,
    /// Record type.
    pub record_type: DnsRecordType,
    /// Record content.
    pub value: String,
    /// Time to live in seconds.
    pub ttl: u32,
    /// MX priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    /// Proxy flag; only sent for proxiable types.
    pub proxied: bool,
}
