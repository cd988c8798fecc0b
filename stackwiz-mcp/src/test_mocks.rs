use super::*;

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use async_trait::async_trait;
use stackwiz_core::config::StackwizConfig;
use stackwiz_core::services::DnsService;
use stackwiz_core::traits::{ContainerRuntime, PublicIpResolver, RunOutput, SystemClock};
use stackwiz_core::types::RuntimeStatus;
use stackwiz_provider::{
    CreateDnsRecordRequest, DnsProvider, DnsRecord, PaginatedResponse, ProviderError,
    ProviderZone, RecordQueryParams, ZoneStatus,
};
use tokio::sync::RwLock;

pub const TEST_ZONE: &str = "rbnk.uk";
pub const TEST_IP: &str = "203.0.113.10";

/// Test-only container runtime keeping per-stack state in memory.
#[derive(Default)]
pub struct MockRuntime {
    states: RwLock<HashMap<String, RuntimeStatus>>,
    calls: RwLock<Vec<String>>,
    unavailable: bool,
}

impl MockRuntime {
    /// Runtime whose every call fails, as if the daemon were down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    async fn record(&self, action: &str, stack_dir: &Path) -> CoreResult<String> {
        let name = stack_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.write().await.push(format!("{action}:{name}"));
        if self.unavailable {
            return Err(CoreError::ProcessFailed {
                command: format!("docker compose {action}"),
                exit_code: Some(1),
                stderr: "Cannot connect to the Docker daemon".to_string(),
            });
        }
        Ok(name)
    }

    async fn set(&self, name: String, status: RuntimeStatus) -> CoreResult<RunOutput> {
        self.states.write().await.insert(name, status);
        Ok(RunOutput::default())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn up(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RunOutput> {
        let name = self.record("up", stack_dir).await?;
        self.set(name, RuntimeStatus::Running).await
    }

    async fn down(
        &self,
        stack_dir: &Path,
        _manifest: &Path,
        purge_volumes: bool,
    ) -> CoreResult<RunOutput> {
        let action = if purge_volumes { "down-v" } else { "down" };
        let name = self.record(action, stack_dir).await?;
        self.states.write().await.remove(&name);
        Ok(RunOutput::default())
    }

    async fn stop(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RunOutput> {
        let name = self.record("stop", stack_dir).await?;
        self.set(name, RuntimeStatus::Stopped).await
    }

    async fn restart(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RunOutput> {
        let name = self.record("restart", stack_dir).await?;
        self.set(name, RuntimeStatus::Running).await
    }

    async fn logs(
        &self,
        stack_dir: &Path,
        _manifest: &Path,
        service: Option<&str>,
        tail_lines: u32,
    ) -> CoreResult<String> {
        let name = self.record("logs", stack_dir).await?;
        let service = service.unwrap_or(&name);
        Ok((1..=tail_lines.min(3))
            .map(|i| format!("{service} | line {i}\n"))
            .collect())
    }

    async fn status(&self, stack_dir: &Path, _manifest: &Path) -> CoreResult<RuntimeStatus> {
        let name = self.record("status", stack_dir).await?;
        Ok(self
            .states
            .read()
            .await
            .get(&name)
            .copied()
            .unwrap_or(RuntimeStatus::Created))
    }

    async fn version(&self) -> CoreResult<String> {
        if self.unavailable {
            return Err(CoreError::ProcessFailed {
                command: "docker compose version".to_string(),
                exit_code: Some(1),
                stderr: "Cannot connect to the Docker daemon".to_string(),
            });
        }
        Ok("2.29.1".to_string())
    }
}

/// Test-only resolver answering a fixed address.
pub struct FixedIpResolver(IpAddr);

#[async_trait]
impl PublicIpResolver for FixedIpResolver {
    async fn resolve(&self) -> CoreResult<IpAddr> {
        Ok(self.0)
    }
}

/// Test-only DNS provider with a single zone and in-memory records.
pub struct MockDnsProvider {
    zone: String,
    records: RwLock<Vec<DnsRecord>>,
    next_id: RwLock<u32>,
}

impl MockDnsProvider {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.to_string(),
            records: RwLock::new(Vec::new()),
            next_id: RwLock::new(0),
        }
    }

    fn zone_id(&self) -> String {
        format!("zone-{}", self.zone)
    }

    pub async fn records(&self) -> Vec<DnsRecord> {
        self.records.read().await.clone()
    }

    fn not_found(record_id: &str) -> ProviderError {
        ProviderError::RecordNotFound {
            provider: "mock".to_string(),
            record_id: record_id.to_string(),
            raw_message: None,
        }
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn validate_credentials(&self) -> stackwiz_provider::Result<bool> {
        Ok(true)
    }

    async fn find_zone(&self, name: &str) -> stackwiz_provider::Result<Option<ProviderZone>> {
        Ok((name == self.zone).then(|| ProviderZone {
            id: self.zone_id(),
            name: self.zone.clone(),
            status: ZoneStatus::Active,
        }))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        params: &RecordQueryParams,
    ) -> stackwiz_provider::Result<PaginatedResponse<DnsRecord>> {
        let matching: Vec<DnsRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.zone_id == zone_id)
            .filter(|r| params.name.as_ref().is_none_or(|n| &r.name == n))
            .filter(|r| params.record_type.is_none_or(|t| r.record_type == t))
            .cloned()
            .collect();
        let total = u32::try_from(matching.len()).unwrap_or(u32::MAX);
        let start = ((params.page.max(1) - 1) * params.page_size) as usize;
        let items = matching
            .into_iter()
            .skip(start)
            .take(params.page_size as usize)
            .collect();
        Ok(PaginatedResponse::new(items, params.page, params.page_size, total))
    }

    async fn create_record(
        &self,
        req: &CreateDnsRecordRequest,
    ) -> stackwiz_provider::Result<DnsRecord> {
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
        let mut next_id = self.next_id.write().await;
        *next_id += 1;
        let record = DnsRecord {
            id: format!("rec-{next_id}"),
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
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Self::not_found(record_id))?;
        record.proxied = proxied;
        Ok(record.clone())
    }

    async fn delete_record(&self, _zone_id: &str, record_id: &str) -> stackwiz_provider::Result<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != record_id);
        if records.len() == before {
            return Err(Self::not_found(record_id));
        }
        Ok(())
    }
}

/// Server wired to mocks, with its stacks under `base`.
pub struct TestServer {
    pub server: StackwizMcp,
    pub ctx: Arc<ServiceContext>,
    pub runtime: Arc<MockRuntime>,
    pub provider: Arc<MockDnsProvider>,
}

pub fn build_server(base: &Path) -> TestServer {
    build_server_with(base, MockRuntime::default())
}

pub fn build_server_with(base: &Path, runtime: MockRuntime) -> TestServer {
    let runtime = Arc::new(runtime);
    let provider = Arc::new(MockDnsProvider::new(TEST_ZONE));
    let ip: Arc<dyn PublicIpResolver> = Arc::new(FixedIpResolver(TEST_IP.parse().unwrap()));
    let clock = Arc::new(SystemClock);

    let dns = Arc::new(DnsService::new(
        provider.clone(),
        Arc::clone(&ip),
        clock.clone(),
        None,
    ));
    let ctx = Arc::new(
        ServiceContext::new(
            StackwizConfig::with_base_dir(base),
            runtime.clone(),
            ip,
            clock,
        )
        .with_dns_service(dns),
    );

    TestServer {
        server: StackwizMcp::new(Arc::clone(&ctx)),
        ctx,
        runtime,
        provider,
    }
}

/// Parse the JSON envelope out of a tool response.
pub fn envelope(result: &CallToolResult) -> serde_json::Value {
    let text = result
        .content
        .first()
        .and_then(|c| c.raw.as_text())
        .map(|t| t.text.as_str())
        .unwrap();
    serde_json::from_str(text).unwrap()
}
