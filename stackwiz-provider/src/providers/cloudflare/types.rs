//! Cloudflare API types

use serde::Deserialize;

/// Cloudflare API response envelope
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    pub errors: Option<Vec<CloudflareError>>,
    pub result_info: Option<CloudflareResultInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub error_chain: Option<Vec<CloudflareError>>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareResultInfo {
    #[serde(default)]
    pub total_count: u32,
}

/// Cloudflare zone
#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

/// Cloudflare DNS record (response)
#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub priority: Option<u16>,
    #[serde(default)]
    pub proxied: Option<bool>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
}
