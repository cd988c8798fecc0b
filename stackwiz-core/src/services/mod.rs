//! Business logic service layer

mod catalog_service;
mod dns_service;
mod health_service;
mod public_ip;
mod stack_service;
mod zone_cache;

pub use catalog_service::{CatalogService, TemplateSource, TemplateView};
pub use dns_service::{DnsService, RecordListing, MAX_LISTING_PAGES};
pub use health_service::{CheckResult, HealthReport, HealthService, CHECK_TIMEOUT};
pub use public_ip::{first_valid_ip, EchoServiceResolver, DEFAULT_IP_SERVICES};
pub use stack_service::{StackService, DEFAULT_TAIL_LINES, MAX_TAIL_LINES, STATUS_CONCURRENCY};
pub use zone_cache::{ZoneCache, ZONE_CACHE_TTL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use stackwiz_provider::{create_provider, ProviderCredentials};
use tokio::sync::OnceCell;

use crate::config::StackwizConfig;
use crate::credentials::{discover_token_from_env, DiscoveredToken};
use crate::error::{CoreError, CoreResult};
use crate::runtime::ComposeCli;
use crate::store::FsStackStore;
use crate::traits::{Clock, ContainerRuntime, PublicIpResolver, SystemClock};

/// Service context - holds all dependencies
///
/// The transport layer builds one of these at start-up and shares it between services.
pub struct ServiceContext {
    pub config: StackwizConfig,
    pub store: FsStackStore,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub ip_resolver: Arc<dyn PublicIpResolver>,
    pub clock: Arc<dyn Clock>,
    /// Built on first use, after token discovery
    dns: OnceCell<Arc<DnsService>>,
    operations: AtomicU64,
    started_at: Instant,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        config: StackwizConfig,
        runtime: Arc<dyn ContainerRuntime>,
        ip_resolver: Arc<dyn PublicIpResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: FsStackStore::new(&config),
            started_at: clock.now(),
            config,
            runtime,
            ip_resolver,
            clock,
            dns: OnceCell::new(),
            operations: AtomicU64::new(0),
        }
    }

    /// Production wiring: compose CLI, public echo services, system clock
    pub fn from_config(config: StackwizConfig) -> CoreResult<Self> {
        let runtime = Arc::new(ComposeCli::from_config(&config.runtime)?);
        Ok(Self::new(
            config,
            runtime,
            Arc::new(EchoServiceResolver::default()),
            Arc::new(SystemClock),
        ))
    }

    /// Use `dns` instead of building one from a discovered token
    #[must_use]
    pub fn with_dns_service(mut self, dns: Arc<DnsService>) -> Self {
        self.dns = OnceCell::new_with(Some(dns));
        self
    }

    /// Run token discovery against the configuration and process environment
    pub async fn discover_token(&self) -> CoreResult<DiscoveredToken> {
        discover_token_from_env(self.config.dns.api_token.as_deref(), &self.config.base_dir).await
    }

    /// The DNS client, created on first call.
    ///
    /// A missing token is a configuration error raised before any network call; a failed
    /// attempt is not cached, so a token added later is picked up.
    pub async fn dns(&self) -> CoreResult<Arc<DnsService>> {
        self.dns
            .get_or_try_init(|| async {
                let token = self.discover_token().await?;
                log::info!("Using DNS API token from {}", token.source);
                let provider = create_provider(ProviderCredentials::Cloudflare {
                    api_token: token.token,
                })?;
                Ok::<_, CoreError>(Arc::new(DnsService::new(
                    provider,
                    Arc::clone(&self.ip_resolver),
                    Arc::clone(&self.clock),
                    self.config.dns.zone.clone(),
                )))
            })
            .await
            .cloned()
    }

    /// Count one served operation; returns the new total
    pub fn record_operation(&self) -> u64 {
        self.operations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn operations_served(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }
}
