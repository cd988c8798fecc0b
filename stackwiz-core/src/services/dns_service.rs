//! DNS record management service

use std::net::IpAddr;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use stackwiz_provider::{
    full_name_to_relative, normalize_domain_name, relative_to_full_name, CreateDnsRecordRequest,
    DnsProvider, ProviderError,
};

use crate::error::{CoreError, CoreResult};
use crate::services::zone_cache::ZoneCache;
use crate::traits::{Clock, PublicIpResolver};
use crate::types::{
    DnsRecord, DnsRecordType, RecordLocation, RecordQueryParams, RecordSpec, Zone, AUTO_VALUE,
};

/// Listing stops after this many pages even if the provider reports more
pub const MAX_LISTING_PAGES: u32 = 1_000;

/// DNS client: zone resolution, record CRUD and proxy toggling against one provider account
pub struct DnsService {
    provider: Arc<dyn DnsProvider>,
    ip_resolver: Arc<dyn PublicIpResolver>,
    zones: ZoneCache,
    registered_zone: Option<String>,
}

impl DnsService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        ip_resolver: Arc<dyn PublicIpResolver>,
        clock: Arc<dyn Clock>,
        registered_zone: Option<String>,
    ) -> Self {
        Self {
            provider,
            ip_resolver,
            zones: ZoneCache::new(clock),
            registered_zone: registered_zone.map(|z| normalize_domain_name(&z)),
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    /// Ask the provider whether the token is accepted
    pub async fn validate_credentials(&self) -> CoreResult<bool> {
        Ok(self.provider.validate_credentials().await?)
    }

    /// Zone covering `domain`.
    ///
    /// Every candidate apex is checked in the cache before the first live lookup.
    pub async fn resolve_zone(&self, domain: &str) -> CoreResult<Zone> {
        let domain = normalize_domain_name(domain);
        let candidates = zone_candidates(&domain, self.registered_zone.as_deref());

        for apex in &candidates {
            if let Some(zone) = self.zones.get(apex).await {
                log::debug!("Zone cache hit for {apex}");
                return Ok(zone);
            }
        }

        for apex in &candidates {
            if let Some(found) = self.provider.find_zone(apex).await? {
                let zone = Zone {
                    id: found.id,
                    name: normalize_domain_name(&found.name),
                };
                self.zones.insert(zone.clone()).await;
                log::debug!("Resolved zone {} ({}) for {domain}", zone.name, zone.id);
                return Ok(zone);
            }
        }

        Err(CoreError::ZoneNotFound(domain))
    }

    /// Split a hostname into its zone and zone-relative name
    pub async fn locate(&self, hostname: &str) -> CoreResult<RecordLocation> {
        let fqdn = normalize_domain_name(hostname);
        let zone = self.resolve_zone(&fqdn).await?;
        Ok(RecordLocation {
            subdomain: full_name_to_relative(&fqdn, &zone.name),
            fqdn,
            zone,
        })
    }

    /// Public address of this host, used for `AUTO` record values
    pub async fn resolve_server_ip(&self) -> CoreResult<IpAddr> {
        self.ip_resolver.resolve().await
    }

    /// Create a record. An existing record with the same name and type is a conflict; replacing
    /// one is delete-then-create.
    pub async fn create_record(&self, zone: &Zone, spec: RecordSpec) -> CoreResult<DnsRecord> {
        let fqdn = relative_to_full_name(&spec.subdomain, &zone.name);

        if spec.proxied && !spec.record_type.supports_proxy() {
            return Err(CoreError::ValidationError(format!(
                "{} records cannot be proxied",
                spec.record_type
            )));
        }
        let value = self.resolve_value(spec.record_type, &spec.value).await?;

        let existing = self
            .find_records(zone, &fqdn, Some(spec.record_type))
            .await?;
        if !existing.is_empty() {
            return Err(CoreError::DuplicateRecord {
                name: fqdn,
                record_type: spec.record_type.to_string(),
            });
        }

        let request = CreateDnsRecordRequest {
            zone_id: zone.id.clone(),
            name: fqdn.clone(),
            record_type: spec.record_type,
            value,
            ttl: spec.ttl,
            priority: spec.priority,
            proxied: spec.proxied,
        };
        let record = self
            .provider
            .create_record(&request)
            .await
            .map_err(|e| match e {
                ProviderError::RecordExists { .. } => CoreError::DuplicateRecord {
                    name: fqdn.clone(),
                    record_type: spec.record_type.to_string(),
                },
                other => other.into(),
            })?;

        log::info!(
            "Created DNS record {} {} -> {} (proxied: {})",
            record.record_type,
            record.name,
            record.value,
            record.proxied
        );
        Ok(record)
    }

    /// Literal value for a record, resolving [`AUTO_VALUE`] and checking address families
    async fn resolve_value(&self, record_type: DnsRecordType, value: &str) -> CoreResult<String> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(AUTO_VALUE) {
            if !matches!(record_type, DnsRecordType::A | DnsRecordType::Aaaa) {
                return Err(CoreError::ValidationError(format!(
                    "{AUTO_VALUE} is only valid for A and AAAA records, not {record_type}"
                )));
            }
            let ip = self.resolve_server_ip().await?;
            check_family(record_type, ip)?;
            return Ok(ip.to_string());
        }

        if value.is_empty() {
            return Err(CoreError::ValidationError(
                "record value must not be empty".to_string(),
            ));
        }
        if matches!(record_type, DnsRecordType::A | DnsRecordType::Aaaa) {
            let ip = value.parse::<IpAddr>().map_err(|_| {
                CoreError::ValidationError(format!("'{value}' is not an IP address"))
            })?;
            check_family(record_type, ip)?;
        }
        Ok(value.to_string())
    }

    /// Lazy, restartable listing of a zone's records, optionally narrowed to names containing
    /// `name_filter` (case-insensitive)
    pub fn list_records(&self, zone: &Zone, name_filter: Option<&str>) -> RecordListing {
        RecordListing {
            provider: Arc::clone(&self.provider),
            zone_id: zone.id.clone(),
            params: RecordQueryParams::default(),
            name_filter: name_filter
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty()),
        }
    }

    /// Records named exactly `fqdn`, optionally of one type
    async fn find_records(
        &self,
        zone: &Zone,
        fqdn: &str,
        record_type: Option<DnsRecordType>,
    ) -> CoreResult<Vec<DnsRecord>> {
        let listing = RecordListing {
            provider: Arc::clone(&self.provider),
            zone_id: zone.id.clone(),
            params: RecordQueryParams {
                name: Some(fqdn.to_string()),
                record_type,
                ..RecordQueryParams::default()
            },
            name_filter: None,
        };
        let records = listing.collect().await?;
        Ok(records
            .into_iter()
            .filter(|r| normalize_domain_name(&r.name) == fqdn)
            .filter(|r| record_type.is_none_or(|t| r.record_type == t))
            .collect())
    }

    /// Set the proxy flag on every proxiable record at `subdomain`.
    ///
    /// Fails with `UnsupportedRecordType` before any mutation when none of the records there can
    /// carry the flag. Records already in the requested state are returned untouched.
    pub async fn update_proxy_flag(
        &self,
        zone: &Zone,
        subdomain: &str,
        enable: bool,
    ) -> CoreResult<Vec<DnsRecord>> {
        let fqdn = relative_to_full_name(subdomain, &zone.name);
        let records = self.find_records(zone, &fqdn, None).await?;
        if records.is_empty() {
            return Err(CoreError::RecordNotFound(fqdn));
        }

        let (proxiable, other): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.record_type.supports_proxy());
        if proxiable.is_empty() {
            return Err(CoreError::UnsupportedRecordType {
                name: fqdn,
                record_type: other
                    .iter()
                    .map(|r| r.record_type.as_str())
                    .collect::<Vec<_>>()
                    .join("/"),
            });
        }

        let mut updated = Vec::with_capacity(proxiable.len());
        for record in proxiable {
            if record.proxied == enable {
                updated.push(record);
                continue;
            }
            let record = self
                .provider
                .set_proxied(&zone.id, &record.id, enable)
                .await?;
            log::info!(
                "Proxy {} for {} {}",
                if enable { "enabled" } else { "disabled" },
                record.record_type,
                record.name
            );
            updated.push(record);
        }
        Ok(updated)
    }

    /// Delete the records at `subdomain`, all types unless `record_type` is given
    pub async fn delete_record(
        &self,
        zone: &Zone,
        subdomain: &str,
        record_type: Option<DnsRecordType>,
    ) -> CoreResult<Vec<DnsRecord>> {
        let fqdn = relative_to_full_name(subdomain, &zone.name);
        let records = self.find_records(zone, &fqdn, record_type).await?;
        if records.is_empty() {
            return Err(CoreError::RecordNotFound(match record_type {
                Some(t) => format!("{fqdn} ({t})"),
                None => fqdn,
            }));
        }

        for record in &records {
            self.provider.delete_record(&zone.id, &record.id).await?;
            log::info!("Deleted DNS record {} {}", record.record_type, record.name);
        }
        Ok(records)
    }
}

/// Record listing that fetches pages on demand. Each call to [`stream`](Self::stream) starts
/// again from the first page.
pub struct RecordListing {
    provider: Arc<dyn DnsProvider>,
    zone_id: String,
    params: RecordQueryParams,
    name_filter: Option<String>,
}

impl RecordListing {
    pub fn stream(&self) -> BoxStream<'static, CoreResult<DnsRecord>> {
        let provider = Arc::clone(&self.provider);
        let zone_id = self.zone_id.clone();
        let params = self.params.clone();
        let name_filter = self.name_filter.clone();

        stream::try_unfold(Some(params.page), move |page| {
            let provider = Arc::clone(&provider);
            let zone_id = zone_id.clone();
            let params = params.clone();
            async move {
                let Some(page) = page else {
                    return Ok::<_, CoreError>(None);
                };
                let response = provider
                    .list_records(&zone_id, &params.with_page(page))
                    .await?;
                // A page may come back empty when every record on it is of a type the provider
                // skips, so paging follows `has_more` alone
                let next = if !response.has_more {
                    None
                } else if page >= MAX_LISTING_PAGES {
                    log::warn!("Record listing for zone {zone_id} truncated at {page} pages");
                    None
                } else {
                    Some(page + 1)
                };
                let items = stream::iter(response.items.into_iter().map(Ok::<_, CoreError>));
                Ok(Some((items, next)))
            }
        })
        .try_flatten()
        .try_filter(move |record| {
            let keep = name_filter
                .as_deref()
                .is_none_or(|f| record.name.to_lowercase().contains(f));
            futures::future::ready(keep)
        })
        .boxed()
    }

    pub async fn collect(&self) -> CoreResult<Vec<DnsRecord>> {
        self.stream().try_collect().await
    }
}

/// Apex candidates for `domain`, longest first
fn zone_candidates(domain: &str, registered: Option<&str>) -> Vec<String> {
    if let Some(zone) = registered {
        if domain == zone || domain.ends_with(&format!(".{zone}")) {
            return vec![zone.to_string()];
        }
    }
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    (0..labels.len().saturating_sub(1))
        .map(|i| labels[i..].join("."))
        .collect()
}

fn check_family(record_type: DnsRecordType, ip: IpAddr) -> CoreResult<()> {
    match (record_type, ip) {
        (DnsRecordType::A, IpAddr::V6(_)) => Err(CoreError::ValidationError(format!(
            "A record needs an IPv4 address, got {ip}"
        ))),
        (DnsRecordType::Aaaa, IpAddr::V4(_)) => Err(CoreError::ValidationError(format!(
            "AAAA record needs an IPv6 address, got {ip}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{FakeClock, FixedIpResolver, MockDnsProvider};

    fn service(provider: &Arc<MockDnsProvider>, clock: &Arc<FakeClock>) -> DnsService {
        DnsService::new(
            provider.clone(),
            Arc::new(FixedIpResolver::new("203.0.113.10")),
            clock.clone(),
            None,
        )
    }

    fn spec(sub: &str, record_type: DnsRecordType, value: &str, proxied: bool) -> RecordSpec {
        RecordSpec {
            subdomain: sub.to_string(),
            record_type,
            value: value.to_string(),
            proxied,
            ttl: 1,
            priority: None,
        }
    }

    // ---- zone resolution ----

    #[test]
    fn candidates_walk_suffixes() {
        assert_eq!(
            zone_candidates("a.b.example.com", None),
            vec!["a.b.example.com", "b.example.com", "example.com"]
        );
        assert!(zone_candidates("localhost", None).is_empty());
        assert_eq!(
            zone_candidates("app.example.co.uk", Some("example.co.uk")),
            vec!["example.co.uk"]
        );
    }

    #[tokio::test]
    async fn resolve_zone_walks_to_apex() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("deep.app.Example.com.").await.unwrap();
        assert_eq!(zone.name, "example.com");
    }

    #[tokio::test]
    async fn resolve_zone_is_cached_within_ttl() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let clock = Arc::new(FakeClock::new());
        let svc = service(&provider, &clock);

        svc.resolve_zone("example.com").await.unwrap();
        svc.resolve_zone("example.com").await.unwrap();
        assert_eq!(provider.find_zone_calls(), 1);

        clock.advance(Duration::from_secs(301));
        svc.resolve_zone("example.com").await.unwrap();
        assert_eq!(provider.find_zone_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_zone_is_not_found() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let err = svc.resolve_zone("other.org").await.unwrap_err();
        assert!(matches!(err, CoreError::ZoneNotFound(d) if d == "other.org"));
    }

    #[tokio::test]
    async fn locate_splits_hostname() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let loc = svc.locate("api.example.com").await.unwrap();
        assert_eq!(loc.subdomain, "api");
        assert_eq!(loc.fqdn, "api.example.com");
        assert_eq!(svc.locate("example.com").await.unwrap().subdomain, "@");
    }

    // ---- create / list ----

    #[tokio::test]
    async fn created_record_lists_unchanged() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();

        let created = svc
            .create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.4", true))
            .await
            .unwrap();
        let listed = svc.list_records(&zone, Some("APP")).collect().await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(created.name, "app.example.com");
        assert_eq!(created.value, "198.51.100.4");
        assert!(created.proxied);
    }

    #[tokio::test]
    async fn auto_value_uses_server_ip() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        let record = svc
            .create_record(&zone, spec("app", DnsRecordType::A, "auto", false))
            .await
            .unwrap();
        assert_eq!(record.value, "203.0.113.10");
    }

    #[tokio::test]
    async fn auto_family_mismatch_rejected() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        let err = svc
            .create_record(&zone, spec("app", DnsRecordType::Aaaa, "AUTO", false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn proxied_txt_is_validation_error() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        let err = svc
            .create_record(&zone, spec("_acme", DnsRecordType::Txt, "token", true))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn duplicate_name_and_type_conflicts() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        svc.create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.4", false))
            .await
            .unwrap();

        let err = svc
            .create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.5", false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRecord { .. }));

        // Same name, different type is fine
        svc.create_record(&zone, spec("app", DnsRecordType::Txt, "v=1", false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn listing_follows_pages_and_restarts() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com").page_size(2));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        for i in 0..5 {
            svc.create_record(
                &zone,
                spec(&format!("host{i}"), DnsRecordType::A, "198.51.100.4", false),
            )
            .await
            .unwrap();
        }

        let listing = svc.list_records(&zone, None);
        assert_eq!(listing.collect().await.unwrap().len(), 5);
        assert_eq!(listing.collect().await.unwrap().len(), 5);

        let first = listing.stream().next().await.unwrap().unwrap();
        assert_eq!(first.name, "host0.example.com");
    }

    #[tokio::test]
    async fn listing_continues_past_pages_of_unmanaged_records() {
        let provider = Arc::new(
            MockDnsProvider::with_zone("example.com")
                .page_size(1)
                .with_unmanaged_records(2),
        );
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        svc.create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.4", false))
            .await
            .unwrap();

        let records = svc.list_records(&zone, None).collect().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "app.example.com");

        let err = svc
            .create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.5", false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRecord { .. }));

        let deleted = svc
            .delete_record(&zone, "app", Some(DnsRecordType::A))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(provider.records().await.is_empty());
    }

    // ---- proxy / delete ----

    #[tokio::test]
    async fn proxy_on_mx_rejected_without_mutation() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        let mut mx = spec("mail", DnsRecordType::Mx, "mx.example.com", false);
        mx.priority = Some(10);
        svc.create_record(&zone, mx).await.unwrap();

        let err = svc.update_proxy_flag(&zone, "mail", true).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsupportedRecordType { ref record_type, .. } if record_type == "MX"
        ));
        assert_eq!(provider.set_proxied_calls(), 0);
    }

    #[tokio::test]
    async fn proxy_toggle_skips_records_already_set() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        svc.create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.4", false))
            .await
            .unwrap();

        let updated = svc.update_proxy_flag(&zone, "app", true).await.unwrap();
        assert!(updated[0].proxied);
        let again = svc.update_proxy_flag(&zone, "app", true).await.unwrap();
        assert!(again[0].proxied);
        assert_eq!(provider.set_proxied_calls(), 1);
    }

    #[tokio::test]
    async fn proxy_on_missing_record_not_found() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        let err = svc.update_proxy_flag(&zone, "ghost", true).await.unwrap_err();
        assert!(matches!(err, CoreError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn delete_by_type_leaves_others() {
        let provider = Arc::new(MockDnsProvider::with_zone("example.com"));
        let svc = service(&provider, &Arc::new(FakeClock::new()));
        let zone = svc.resolve_zone("example.com").await.unwrap();
        svc.create_record(&zone, spec("app", DnsRecordType::A, "198.51.100.4", false))
            .await
            .unwrap();
        svc.create_record(&zone, spec("app", DnsRecordType::Txt, "hello", false))
            .await
            .unwrap();

        let deleted = svc
            .delete_record(&zone, "app", Some(DnsRecordType::Txt))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(provider.delete_calls(), 1);
        let left = svc.list_records(&zone, Some("app")).collect().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].record_type, DnsRecordType::A);

        let err = svc
            .delete_record(&zone, "app", Some(DnsRecordType::Txt))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RecordNotFound(_)));
    }
}
