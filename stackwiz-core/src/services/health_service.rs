//! Server health checks

use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::services::ServiceContext;

/// Upper bound for each individual check
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

type CheckOutput = Result<(String, Option<Value>), String>;

/// One health check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub healthy: bool,
    /// Whether a failure makes the whole server unhealthy
    pub critical: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// All critical checks passed
    pub healthy: bool,
    pub checks: Vec<CheckResult>,
    pub uptime_seconds: u64,
    pub operations_served: u64,
    pub version: &'static str,
}

pub struct HealthService {
    ctx: Arc<ServiceContext>,
}

impl HealthService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Run every check concurrently
    pub async fn check(&self) -> HealthReport {
        let (runtime, filesystem, dns, templates) = futures::join!(
            bounded("runtime", true, self.check_runtime()),
            bounded("filesystem", true, self.check_filesystem()),
            bounded("dns", false, self.check_dns()),
            bounded("templates", false, self.check_templates()),
        );
        let checks = vec![runtime, filesystem, dns, templates];
        let healthy = checks.iter().all(|c| c.healthy || !c.critical);

        for check in checks.iter().filter(|c| !c.healthy) {
            if check.critical {
                log::error!("Health check {} failed: {}", check.name, check.message);
            } else {
                log::warn!("Health check {} failed: {}", check.name, check.message);
            }
        }

        HealthReport {
            healthy,
            checks,
            uptime_seconds: self.ctx.uptime().as_secs(),
            operations_served: self.ctx.operations_served(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    async fn check_runtime(&self) -> CheckOutput {
        let version = self.ctx.runtime.version().await.map_err(|e| e.to_string())?;
        Ok((
            format!("container runtime reachable (compose {version})"),
            Some(json!({ "version": version })),
        ))
    }

    async fn check_filesystem(&self) -> CheckOutput {
        let base = self.ctx.store.base_dir();
        self.ctx
            .store
            .probe_writable()
            .await
            .map_err(|e| e.to_string())?;
        Ok((
            format!("{} is writable", base.display()),
            Some(json!({ "base_dir": base })),
        ))
    }

    async fn check_dns(&self) -> CheckOutput {
        let dns = self.ctx.dns().await.map_err(|e| e.to_string())?;
        match dns.validate_credentials().await {
            Ok(true) => Ok((
                format!("{} accepted the API token", dns.provider_id()),
                None,
            )),
            Ok(false) => Err(format!("{} rejected the API token", dns.provider_id())),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn check_templates(&self) -> CheckOutput {
        let dir = self.ctx.store.templates_dir();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(("built-in templates in use".to_string(), None));
            }
            Err(e) => return Err(format!("cannot read {}: {e}", dir.display())),
        };

        let mut overrides = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| e.to_string())? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with("-template.yml") || name.ends_with("-env-template") {
                overrides.push(name);
            }
        }
        overrides.sort();
        Ok((
            format!("{} template override(s) in {}", overrides.len(), dir.display()),
            Some(json!({ "overrides": overrides })),
        ))
    }
}

async fn bounded<F>(name: &'static str, critical: bool, check: F) -> CheckResult
where
    F: Future<Output = CheckOutput>,
{
    let (healthy, message, details) = match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok((message, details))) => (true, message, details),
        Ok(Err(message)) => (false, message, None),
        Err(_) => (
            false,
            format!("timed out after {}s", CHECK_TIMEOUT.as_secs()),
            None,
        ),
    };
    CheckResult {
        name,
        healthy,
        critical,
        message,
        details,
    }
}
