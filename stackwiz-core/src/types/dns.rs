//! DNS record related type definitions

use serde::{Deserialize, Serialize};

use stackwiz_provider::DnsRecordType;

/// Sentinel record value replaced by the server's detected public IP
pub const AUTO_VALUE: &str = "AUTO";

/// A zone the provider manages, as resolved from a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider zone ID
    pub id: String,
    /// Apex domain
    pub name: String,
}

/// Record to create, addressed relative to its zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    /// Relative name (`@` for the apex)
    pub subdomain: String,
    pub record_type: DnsRecordType,
    /// Literal value, or [`AUTO_VALUE`] for `A`/`AAAA`
    pub value: String,
    pub proxied: bool,
    pub ttl: u32,
    /// MX priority
    pub priority: Option<u16>,
}

/// A hostname split into its zone and zone-relative name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordLocation {
    pub zone: Zone,
    pub subdomain: String,
    pub fqdn: String,
}
