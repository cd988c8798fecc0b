//! Test helpers
//!
//! Mock implementations of the runtime, DNS provider, IP resolver and clock seams, plus a
//! factory for a fully wired [`ServiceContext`] rooted at a temporary directory.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use stackwiz_provider::{
    normalize_domain_name, CreateDnsRecordRequest, DnsProvider, DnsRecord, PaginatedResponse,
    ProviderError, ProviderZone, RecordQueryParams, ZoneStatus,
};

use crate::config::StackwizConfig;
use crate::error::{CoreError, CoreResult};
use crate::services::{DnsService, ServiceContext};
use crate::traits::{Clock, ContainerRuntime, PublicIpResolver, RunOutput};
use crate::types::RuntimeStatus;

// ===== FakeClock =====

pub struct FakeClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }
}

// ===== FixedIpResolver =====

pub struct FixedIpResolver {
    ip: Option<IpAddr>,
}

impl FixedIpResolver {
    pub fn new(ip: &str) -> Self {
        Self {
            ip: Some(ip.parse().unwrap()),
        }
    }

    pub fn failing() -> Self {
        Self { ip: None }
    }
}

#[async_trait]
impl PublicIpResolver for FixedIpResolver {
    async fn resolve(&self) -> CoreResult<IpAddr> {
        self.ip
            .ok_or_else(|| CoreError::IpDetectionFailed("all services unreachable".into()))
    }
}

// ===== MockRuntime =====

/// In-memory container runtime keyed by stack directory name
pub struct MockRuntime {
    states: RwLock<HashMap<String, RuntimeStatus>>,
    calls: Mutex<Vec<String>>,
    /// Action that fails with a process error (e.g. "up")
    fail_action: RwLock<Option<String>>,
    /// Stacks whose status query fails
    broken_status: RwLock<HashSet<String>>,
    status_in_flight: AtomicUsize,
    status_peak: AtomicUsize,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_action: RwLock::new(None),
            broken_status: RwLock::new(HashSet::new()),
            status_in_flight: AtomicUsize::new(0),
            status_peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of status queries that were in progress at once
    pub fn peak_status_queries(&self) -> usize {
        self.status_peak.load(Ordering::SeqCst)
    }

    pub async fn fail_on(&self, action: &str) {
        *self.fail_action.write().await = Some(action.to_string());
    }

    pub async fn break_status(&self, stack: &str) {
        self.broken_status.write().await.insert(stack.to_string());
    }

    pub async fn set_status(&self, stack: &str, status: RuntimeStatus) {
        self.states.write().await.insert(stack.to_string(), status);
    }

    /// `"{action}:{stack}"` in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, action: &str, stack_dir: &Path) -> CoreResult<String> {
        let stack = stack_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(format!("{action}:{stack}"));
        if self.fail_action.read().await.as_deref() == Some(action) {
            return Err(CoreError::ProcessFailed {
                command: format!("docker compose {action}"),
                exit_code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(stack)
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn up(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RunOutput> {
        let stack = self.record("up", stack_dir).await?;
        self.set_status(&stack, RuntimeStatus::Running).await;
        Ok(RunOutput::default())
    }

    async fn down(
        &self,
        stack_dir: &Path,
        _manifest: &Path,
        purge_volumes: bool,
    ) -> CoreResult<RunOutput> {
        let action = if purge_volumes { "down-v" } else { "down" };
        let stack = self.record(action, stack_dir).await?;
        self.states.write().await.remove(&stack);
        Ok(RunOutput::default())
    }

    async fn stop(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RunOutput> {
        let stack = self.record("stop", stack_dir).await?;
        self.set_status(&stack, RuntimeStatus::Stopped).await;
        Ok(RunOutput::default())
    }

    async fn restart(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RunOutput> {
        let stack = self.record("restart", stack_dir).await?;
        self.set_status(&stack, RuntimeStatus::Running).await;
        Ok(RunOutput::default())
    }

    async fn logs(
        &self,
        stack_dir: &Path,
        _manifest: &Path,
        service: Option<&str>,
        tail_lines: u32,
    ) -> CoreResult<String> {
        let stack = self.record("logs", stack_dir).await?;
        let service = service.unwrap_or(&stack);
        Ok((0..tail_lines.min(3))
            .map(|i| format!("{service} | line {i}\n"))
            .collect())
    }

    async fn status(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RuntimeStatus> {
        let in_flight = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.status_peak.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.status_in_flight.fetch_sub(1, Ordering::SeqCst);

        let stack = stack_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.broken_status.read().await.contains(&stack) {
            return Err(CoreError::Timeout {
                operation: "docker compose ps".to_string(),
                seconds: 120,
            });
        }
        Ok(self
            .states
            .read()
            .await
            .get(&stack)
            .copied()
            .unwrap_or(RuntimeStatus::Created))
    }

    async fn version(&self) -> CoreResult<String> {
        if self.fail_action.read().await.as_deref() == Some("version") {
            return Err(CoreError::ConfigurationError(
                "container runtime not found".to_string(),
            ));
        }
        Ok("2.29.1".to_string())
    }
}

// ===== MockDnsProvider =====

/// In-memory single-account DNS provider with call counters
pub struct MockDnsProvider {
    zones: Vec<ProviderZone>,
    records: RwLock<Vec<DnsRecord>>,
    page_size: Option<u32>,
    /// Records counted in every listing's total but never returned, like types the client skips
    unmanaged: u32,
    accept_credentials: bool,
    next_id: AtomicU32,
    find_zone_calls: AtomicUsize,
    create_calls: AtomicUsize,
    set_proxied_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockDnsProvider {
    pub fn with_zone(name: &str) -> Self {
        Self {
            zones: vec![ProviderZone {
                id: format!("zone-{name}"),
                name: name.to_string(),
                status: ZoneStatus::Active,
            }],
            records: RwLock::new(Vec::new()),
            page_size: None,
            unmanaged: 0,
            accept_credentials: true,
            next_id: AtomicU32::new(1),
            find_zone_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            set_proxied_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Force a page size regardless of the request
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Put `count` unmanaged records ahead of the real ones in every listing
    #[must_use]
    pub fn with_unmanaged_records(mut self, count: u32) -> Self {
        self.unmanaged = count;
        self
    }

    #[must_use]
    pub fn rejecting_credentials(mut self) -> Self {
        self.accept_credentials = false;
        self
    }

    pub fn find_zone_calls(&self) -> usize {
        self.find_zone_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn set_proxied_calls(&self) -> usize {
        self.set_proxied_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub async fn records(&self) -> Vec<DnsRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn validate_credentials(&self) -> stackwiz_provider::Result<bool> {
        Ok(self.accept_credentials)
    }

    async fn find_zone(&self, name: &str) -> stackwiz_provider::Result<Option<ProviderZone>> {
        self.find_zone_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.zones.iter().find(|z| z.name == name).cloned())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        params: &RecordQueryParams,
    ) -> stackwiz_provider::Result<PaginatedResponse<DnsRecord>> {
        let records = self.records.read().await;
        let managed = records
            .iter()
            .filter(|r| r.zone_id == zone_id)
            .filter(|r| {
                params
                    .name
                    .as_deref()
                    .is_none_or(|n| normalize_domain_name(n) == r.name)
            })
            .filter(|r| params.record_type.is_none_or(|t| t == r.record_type))
            .cloned()
            .map(Some);
        let matching: Vec<Option<DnsRecord>> = std::iter::repeat_n(None, self.unmanaged as usize)
            .chain(managed)
            .collect();

        let size = self.page_size.unwrap_or(params.page_size).max(1);
        let total = u32::try_from(matching.len()).unwrap();
        let start = ((params.page.max(1) - 1) * size) as usize;
        let items = matching
            .into_iter()
            .skip(start)
            .take(size as usize)
            .flatten()
            .collect();
        Ok(PaginatedResponse::new(items, params.page, size, total))
    }

    async fn create_record(
        &self,
        req: &CreateDnsRecordRequest,
    ) -> stackwiz_provider::Result<DnsRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.name == req.name && r.record_type == req.record_type)
        {
            return Err(ProviderError::RecordExists {
                provider: "mock".to_string(),
                record_name: req.name.clone(),
                raw_message: None,
            });
        }
        let record = DnsRecord {
            id: format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            zone_id: req.zone_id.clone(),
            record_type: req.record_type,
            name: req.name.clone(),
            value: req.value.clone(),
            ttl: req.ttl,
            priority: req.priority,
            proxied: req.proxied,
            created_at: None,
            updated_at: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn set_proxied(
        &self,
        _zone_id: &str,
        record_id: &str,
        proxied: bool,
    ) -> stackwiz_provider::Result<DnsRecord> {
        self.set_proxied_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| ProviderError::RecordNotFound {
                provider: "mock".to_string(),
                record_id: record_id.to_string(),
                raw_message: None,
            })?;
        record.proxied = proxied;
        Ok(record.clone())
    }

    async fn delete_record(&self, _zone_id: &str, record_id: &str) -> stackwiz_provider::Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.records.write().await.retain(|r| r.id != record_id);
        Ok(())
    }
}

// ===== Context factory =====

pub struct TestContext {
    pub ctx: Arc<ServiceContext>,
    pub runtime: Arc<MockRuntime>,
    pub provider: Arc<MockDnsProvider>,
}

/// Context with mocks, DNS zone `rbnk.uk` and server IP `203.0.113.10`
pub fn test_context(base: &Path) -> TestContext {
    test_context_with(StackwizConfig::with_base_dir(base))
}

pub fn test_context_with(config: StackwizConfig) -> TestContext {
    let runtime = Arc::new(MockRuntime::new());
    let provider = Arc::new(MockDnsProvider::with_zone("rbnk.uk"));
    let ip_resolver: Arc<dyn PublicIpResolver> = Arc::new(FixedIpResolver::new("203.0.113.10"));
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new());

    let dns = Arc::new(DnsService::new(
        provider.clone(),
        ip_resolver.clone(),
        clock.clone(),
        config.dns.zone.clone(),
    ));
    let ctx = ServiceContext::new(config, runtime.clone(), ip_resolver, clock)
        .with_dns_service(dns);

    TestContext {
        ctx: Arc::new(ctx),
        runtime,
        provider,
    }
}
