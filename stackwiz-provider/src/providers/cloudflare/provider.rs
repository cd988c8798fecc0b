//! Cloudflare `DnsProvider` implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::http_client::ApiRequest;
use crate::providers::common::{normalize_domain_name, parse_record_type};
use crate::traits::{DnsProvider, ErrorContext, ProviderErrorMapper};
use crate::types::{
    CreateDnsRecordRequest, DnsRecord, PaginatedResponse, ProviderZone, RecordQueryParams,
    ZoneStatus,
};

use super::{CloudflareDnsRecord, CloudflareProvider, CloudflareZone, MAX_PAGE_SIZE_RECORDS};

impl CloudflareProvider {
    /// Cloudflare zone status: active, pending, initializing, moved
    pub(crate) fn zone_to_provider_zone(zone: CloudflareZone) -> ProviderZone {
        let status = match zone.status.as_str() {
            "active" => ZoneStatus::Active,
            "pending" | "initializing" => ZoneStatus::Pending,
            "moved" | "deactivated" => ZoneStatus::Paused,
            _ => ZoneStatus::Unknown,
        };

        ProviderZone {
            id: zone.id,
            name: normalize_domain_name(&zone.name),
            status,
        }
    }

    pub(crate) fn cf_record_to_dns_record(
        &self,
        cf_record: CloudflareDnsRecord,
        zone_id: &str,
    ) -> Result<DnsRecord> {
        let record_type = parse_record_type(&cf_record.record_type, self.provider_name())?;

        Ok(DnsRecord {
            id: cf_record.id,
            zone_id: zone_id.to_string(),
            record_type,
            name: normalize_domain_name(&cf_record.name),
            value: cf_record.content,
            ttl: cf_record.ttl,
            priority: cf_record.priority,
            proxied: cf_record.proxied.unwrap_or(false),
            created_at: parse_timestamp(cf_record.created_on.as_deref()),
            updated_at: parse_timestamp(cf_record.modified_on.as_deref()),
        })
    }

    fn to_json<B: Serialize>(&self, body: &B) -> Result<serde_json::Value> {
        serde_json::to_value(body).map_err(|e| ProviderError::SerializationError {
            provider: self.provider_name().to_string(),
            detail: e.to_string(),
        })
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Serialize)]
struct CreateRecordBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxied: Option<bool>,
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn id(&self) -> &'static str {
        "cloudflare"
    }

    async fn validate_credentials(&self) -> Result<bool> {
        #[derive(Deserialize)]
        struct VerifyResponse {
            status: String,
        }

        match self
            .request::<VerifyResponse>(
                ApiRequest::get("/user/tokens/verify"),
                ErrorContext::default(),
            )
            .await
        {
            Ok(resp) => Ok(resp.status == "active"),
            Err(ProviderError::InvalidCredentials { .. } | ProviderError::PermissionDenied { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_zone(&self, name: &str) -> Result<Option<ProviderZone>> {
        let name = normalize_domain_name(name);
        let path = format!("/zones?name={}&per_page=1", urlencoding::encode(&name));
        let context = ErrorContext {
            domain: Some(name.clone()),
            ..ErrorContext::default()
        };

        let (zones, _): (Vec<CloudflareZone>, u32) = self
            .request_paginated(ApiRequest::get(path), context)
            .await?;

        Ok(zones
            .into_iter()
            .find(|zone| normalize_domain_name(&zone.name) == name)
            .map(Self::zone_to_provider_zone))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        params: &RecordQueryParams,
    ) -> Result<PaginatedResponse<DnsRecord>> {
        let page = params.page.max(1);
        let page_size = params.page_size.clamp(1, MAX_PAGE_SIZE_RECORDS);

        let mut path = format!("/zones/{zone_id}/dns_records?page={page}&per_page={page_size}");
        if let Some(name) = params.name.as_deref().filter(|n| !n.is_empty()) {
            path.push_str(&format!("&name={}", urlencoding::encode(name)));
        }
        if let Some(record_type) = params.record_type {
            path.push_str(&format!("&type={}", record_type.as_str()));
        }

        let context = ErrorContext {
            domain: Some(zone_id.to_string()),
            ..ErrorContext::default()
        };
        let (cf_records, total_count): (Vec<CloudflareDnsRecord>, u32) =
            self.request_paginated(ApiRequest::get(path), context).await?;

        let mut records = Vec::with_capacity(cf_records.len());
        for cf_record in cf_records {
            match self.cf_record_to_dns_record(cf_record, zone_id) {
                Ok(record) => records.push(record),
                // Zones may hold types this client does not manage (HTTPS, PTR, ...)
                Err(ProviderError::UnsupportedRecordType { record_type, .. }) => {
                    log::debug!("[cloudflare] Skipping unsupported record type {record_type}");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(PaginatedResponse::new(
            records,
            page,
            page_size,
            total_count,
        ))
    }

    async fn create_record(&self, req: &CreateDnsRecordRequest) -> Result<DnsRecord> {
        let body = CreateRecordBody {
            record_type: req.record_type.as_str(),
            name: &req.name,
            content: &req.value,
            ttl: req.ttl,
            priority: req.priority,
            proxied: req.record_type.supports_proxy().then_some(req.proxied),
        };
        let body = self.to_json(&body)?;

        let context = ErrorContext {
            record_name: Some(req.name.clone()),
            domain: Some(req.zone_id.clone()),
            ..ErrorContext::default()
        };
        let cf_record: CloudflareDnsRecord = self
            .request(
                ApiRequest::post(format!("/zones/{}/dns_records", req.zone_id), body),
                context,
            )
            .await?;

        self.cf_record_to_dns_record(cf_record, &req.zone_id)
    }

    async fn set_proxied(
        &self,
        zone_id: &str,
        record_id: &str,
        proxied: bool,
    ) -> Result<DnsRecord> {
        let context = ErrorContext {
            record_id: Some(record_id.to_string()),
            domain: Some(zone_id.to_string()),
            ..ErrorContext::default()
        };
        let cf_record: CloudflareDnsRecord = self
            .request(
                ApiRequest::patch(
                    format!("/zones/{zone_id}/dns_records/{record_id}"),
                    serde_json::json!({ "proxied": proxied }),
                ),
                context,
            )
            .await?;

        self.cf_record_to_dns_record(cf_record, zone_id)
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let context = ErrorContext {
            record_id: Some(record_id.to_string()),
            domain: Some(zone_id.to_string()),
            ..ErrorContext::default()
        };
        let _: serde_json::Value = self
            .request(
                ApiRequest::delete(format!("/zones/{zone_id}/dns_records/{record_id}")),
                context,
            )
            .await?;
        Ok(())
    }
}
