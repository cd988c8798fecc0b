//! Provider helper functions

use crate::error::{ProviderError, Result};
use crate::types::DnsRecordType;

// ============ Record type conversion ============

/// Parse a provider record type string
pub fn parse_record_type(record_type: &str, provider: &str) -> Result<DnsRecordType> {
    record_type
        .parse()
        .map_err(|_| ProviderError::UnsupportedRecordType {
            provider: provider.to_string(),
            record_type: record_type.to_string(),
        })
}

// ============ Domain name handling ============

/// Strip the trailing dot and lowercase
pub fn normalize_domain_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Convert a fully-qualified name to a zone-relative one
/// e.g. "www.example.com" + "example.com" -> "www"
/// e.g. "example.com" + "example.com" -> "@"
pub fn full_name_to_relative(full_name: &str, zone_name: &str) -> String {
    let full = normalize_domain_name(full_name);
    let zone = normalize_domain_name(zone_name);

    if full == zone {
        "@".to_string()
    } else if let Some(subdomain) = full.strip_suffix(&format!(".{zone}")) {
        subdomain.to_string()
    } else {
        full
    }
}

/// Convert a zone-relative name to a fully-qualified one
/// e.g. "www" + "example.com" -> "www.example.com"
/// e.g. "@" + "example.com" -> "example.com"
pub fn relative_to_full_name(relative_name: &str, zone_name: &str) -> String {
    let zone = normalize_domain_name(zone_name);
    let relative = normalize_domain_name(relative_name);

    if relative == "@" || relative.is_empty() || relative == zone {
        zone
    } else if relative.ends_with(&format!(".{zone}")) {
        relative
    } else {
        format!("{relative}.{zone}")
    }
}
