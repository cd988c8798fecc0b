//! Stack lifecycle service

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::store::FsStackStore;
use crate::template;
use crate::traits::ContainerRuntime;
use crate::types::{
    CreateStackOutcome, CreateStages, DnsRecord, DnsRecordType, FieldError, ListStacksQuery,
    ManageOptions, ManageOutcome, RecordSpec, RuntimeStatus, StackAction, StackKind, StackRecord,
    StackSortKey, StackSpec, StackSummary, StageOutcome, ValidationReport, AUTO_VALUE,
};
use crate::validation;

pub const DEFAULT_TAIL_LINES: u32 = 100;
pub const MAX_TAIL_LINES: u32 = 10_000;
/// Status queries run at once while listing
pub const STATUS_CONCURRENCY: usize = 4;

const ENCRYPTION_KEY_VAR: &str = "PB_ENCRYPTION_KEY";
const ENCRYPTION_KEY_LEN: usize = 32;

/// Stack lifecycle service
pub struct StackService {
    ctx: Arc<ServiceContext>,
}

impl StackService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    // ===== Create =====

    /// Validate, render and materialize a stack, then optionally start it and create its DNS
    /// record.
    ///
    /// Failures up to and including materialization are returned as `Err` and leave nothing on
    /// disk. Later stages never undo earlier ones: their failures are reported per stage in the
    /// returned outcome.
    pub async fn create_stack(&self, spec: StackSpec) -> CoreResult<CreateStackOutcome> {
        let config = &self.ctx.config;
        let report = validation::check(&spec, config);
        let mut stack = match report.normalized.clone() {
            Some(stack) if report.valid => stack,
            _ => return Err(CoreError::InvalidStackSpec(report)),
        };
        let mut warnings = report.warnings;

        if self.ctx.store.exists(&stack.name).await {
            return Err(CoreError::StackExists(stack.name));
        }

        let overrides = self.ctx.store.load_template_overrides(stack.kind).await?;
        if stack.kind == StackKind::Pocketbase && !stack.environment.contains_key(ENCRYPTION_KEY_VAR)
        {
            stack
                .environment
                .insert(ENCRYPTION_KEY_VAR.to_string(), generate_key());
        }
        let rendered = template::render(&stack, &overrides)?;
        let archetype = template::archetype(stack.kind);

        let materialized = self
            .ctx
            .store
            .materialize(&stack.name, &rendered, archetype.volume_dirs)
            .await?;
        warnings.extend(materialized.warnings);
        log::info!("Created stack {} ({})", stack.name, stack.kind);

        let mut stages = CreateStages {
            materialize: StageOutcome::Succeeded,
            ..CreateStages::default()
        };

        if spec.auto_start.unwrap_or(config.auto_start) {
            match self
                .ctx
                .runtime
                .up(&materialized.path, &materialized.manifest_path)
                .await
            {
                Ok(_) => {
                    log::info!("Started stack {}", stack.name);
                    stages.start = StageOutcome::Succeeded;
                }
                Err(e) => {
                    log_failure(&format!("Starting stack {}", stack.name), &e);
                    stages.start = StageOutcome::failed(&e);
                }
            }
        }

        let mut dns_record = None;
        if spec.create_dns.unwrap_or(false) && !stages.start.is_failed() {
            let proxied = spec.proxied.unwrap_or(config.dns.default_proxied);
            match self.create_stack_record(&stack.domain, proxied).await {
                Ok(record) => {
                    stages.dns = StageOutcome::Succeeded;
                    dns_record = Some(record);
                }
                Err(e) => {
                    log_failure(&format!("DNS record for {}", stack.domain), &e);
                    stages.dns = StageOutcome::failed(&e);
                }
            }
        }

        let pocketbase = stack.kind == StackKind::Pocketbase;
        Ok(CreateStackOutcome {
            url: format!("https://{}", stack.domain),
            admin_url: pocketbase.then(|| format!("https://{}/_/", stack.domain)),
            api_url: pocketbase.then(|| format!("https://{}/api/", stack.domain)),
            name: stack.name,
            kind: stack.kind,
            domain: stack.domain,
            path: materialized.path,
            stages,
            dns_record,
            warnings,
        })
    }

    async fn create_stack_record(&self, domain: &str, proxied: bool) -> CoreResult<DnsRecord> {
        let dns = self.ctx.dns().await?;
        let location = dns.locate(domain).await?;
        dns.create_record(
            &location.zone,
            RecordSpec {
                subdomain: location.subdomain,
                record_type: DnsRecordType::A,
                value: AUTO_VALUE.to_string(),
                proxied,
                ttl: self.ctx.config.dns.default_ttl,
                priority: None,
            },
        )
        .await
    }

    // ===== Manage =====

    pub async fn manage_stack(
        &self,
        name: &str,
        action: StackAction,
        options: ManageOptions,
    ) -> CoreResult<ManageOutcome> {
        let record = self.ctx.store.read(name).await?;
        let mut outcome = ManageOutcome {
            name: record.name.clone(),
            action,
            performed: true,
            message: String::new(),
            logs: None,
            archived_to: None,
            status: None,
        };

        match action {
            StackAction::Start => {
                if self.status_of(&record).await == RuntimeStatus::Running {
                    outcome.performed = false;
                    outcome.message = format!("Stack '{name}' is already running");
                } else {
                    self.ctx
                        .runtime
                        .up(&record.path, &record.manifest_path)
                        .await?;
                    log::info!("Started stack {name}");
                    outcome.message = format!("Stack '{name}' started");
                }
                outcome.status = Some(self.status_of(&record).await);
            }
            StackAction::Stop => {
                let current = self.status_of(&record).await;
                if matches!(current, RuntimeStatus::Stopped | RuntimeStatus::Created) {
                    outcome.performed = false;
                    outcome.message = format!("Stack '{name}' is already stopped");
                } else {
                    self.ctx
                        .runtime
                        .stop(&record.path, &record.manifest_path)
                        .await?;
                    log::info!("Stopped stack {name}");
                    outcome.message = format!("Stack '{name}' stopped");
                }
                outcome.status = Some(self.status_of(&record).await);
            }
            StackAction::Restart => {
                self.ctx
                    .runtime
                    .restart(&record.path, &record.manifest_path)
                    .await?;
                log::info!("Restarted stack {name}");
                outcome.message = format!("Stack '{name}' restarted");
                outcome.status = Some(self.status_of(&record).await);
            }
            StackAction::Logs => {
                let tail = options.tail_lines.unwrap_or(DEFAULT_TAIL_LINES);
                if !(1..=MAX_TAIL_LINES).contains(&tail) {
                    return Err(CoreError::ValidationError(format!(
                        "tail_lines must be between 1 and {MAX_TAIL_LINES} (got {tail})"
                    )));
                }
                let logs = self
                    .ctx
                    .runtime
                    .logs(
                        &record.path,
                        &record.manifest_path,
                        options.service.as_deref(),
                        tail,
                    )
                    .await?;
                outcome.message = format!("Last {tail} log lines of '{name}'");
                outcome.logs = Some(logs);
            }
            StackAction::Remove => {
                let archived_to = self.remove_stack(&record, &options).await?;
                outcome.message = match &archived_to {
                    Some(path) => format!(
                        "Stack '{name}' removed; volumes archived to {}",
                        path.display()
                    ),
                    None => format!("Stack '{name}' removed"),
                };
                outcome.archived_to = archived_to;
                outcome.status = Some(RuntimeStatus::Missing);
            }
        }

        Ok(outcome)
    }

    async fn remove_stack(
        &self,
        record: &StackRecord,
        options: &ManageOptions,
    ) -> CoreResult<Option<PathBuf>> {
        if FsStackStore::is_system_stack(&record.name) && !options.force {
            return Err(CoreError::ProtectedStack(record.name.clone()));
        }

        if let Err(e) = self
            .ctx
            .runtime
            .down(&record.path, &record.manifest_path, options.purge_volumes)
            .await
        {
            if !options.force {
                return Err(e);
            }
            log::warn!("Ignoring failed shutdown of {} (forced): {e}", record.name);
        }

        let volume_dirs = template::archetype(record.kind).volume_dirs;
        let removed = self
            .ctx
            .store
            .remove(&record.name, options.purge_volumes, volume_dirs)
            .await?;
        log::info!("Removed stack {}", record.name);
        Ok(removed.archived_to)
    }

    /// Runtime status; a failed query reads as `error`
    async fn status_of(&self, record: &StackRecord) -> RuntimeStatus {
        query_status(self.ctx.runtime.as_ref(), &record.name, &record.path, &record.manifest_path)
            .await
    }

    // ===== List =====

    /// Enumerate stacks. A status query failure marks that one entry `error`; it never fails the
    /// listing.
    pub async fn list_stacks(&self, query: &ListStacksQuery) -> CoreResult<Vec<StackSummary>> {
        let filter = query
            .filter
            .as_deref()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());

        let names: Vec<String> = self
            .ctx
            .store
            .list_names()
            .await?
            .into_iter()
            .filter(|name| filter.as_deref().is_none_or(|f| name.contains(f)))
            .collect();

        let entries: Vec<_> = names.iter().map(|name| async move {
            let record = match self.ctx.store.read(name).await {
                Ok(record) => record,
                Err(e) => {
                    // Removed between enumeration and read
                    log::warn!("Skipping stack {name}: {e}");
                    return None;
                }
            };
            let status = if query.include_status {
                Some(self.status_of(&record).await)
            } else {
                None
            };
            Some(StackSummary {
                status,
                ..StackSummary::from(record)
            })
        }).collect();
        let mut stacks: Vec<StackSummary> = futures::stream::iter(entries)
            .buffered(STATUS_CONCURRENCY)
            .filter_map(std::future::ready)
            .collect()
            .await;

        sort_stacks(&mut stacks, query.sort_by);
        Ok(stacks)
    }

    // ===== Validate =====

    /// Validation report without side effects. With `check_conflicts`, a spec that is otherwise
    /// valid is also checked against existing stacks for name, domain and port collisions.
    pub async fn validate_stack_config(
        &self,
        spec: &StackSpec,
        check_conflicts: bool,
    ) -> CoreResult<ValidationReport> {
        let mut report = validation::check(spec, &self.ctx.config);
        if !check_conflicts || !report.valid {
            return Ok(report);
        }
        let Some(stack) = report.normalized.clone() else {
            return Ok(report);
        };

        let mut conflicts = Vec::new();
        if self.ctx.store.exists(&stack.name).await {
            conflicts.push(FieldError::new(
                "name",
                format!("stack '{}' already exists", stack.name),
            ));
        }
        for other in self.ctx.store.list_names().await? {
            if other == stack.name {
                continue;
            }
            let Ok(existing) = self.ctx.store.read(&other).await else {
                continue;
            };
            if existing.domain.as_deref() == Some(stack.domain.as_str()) {
                conflicts.push(FieldError::new(
                    "domain",
                    format!("domain '{}' is already used by stack '{other}'", stack.domain),
                ));
            }
            if stack.kind == StackKind::Generic && existing.port == Some(stack.port) {
                conflicts.push(FieldError::new(
                    "port",
                    format!("port {} is already used by stack '{other}'", stack.port),
                ));
            }
        }

        if !conflicts.is_empty() {
            report.valid = false;
            report.normalized = None;
            report.errors.extend(conflicts);
        }
        Ok(report)
    }
}

async fn query_status(
    runtime: &dyn ContainerRuntime,
    name: &str,
    path: &Path,
    manifest: &Path,
) -> RuntimeStatus {
    match runtime.status(path, manifest).await {
        Ok(status) => status,
        Err(e) => {
            log::warn!("Status of stack {name} unavailable: {e}");
            RuntimeStatus::Error
        }
    }
}

fn sort_stacks(stacks: &mut [StackSummary], key: StackSortKey) {
    stacks.sort_by(|a, b| {
        let primary = match key {
            StackSortKey::Name => Ordering::Equal,
            // Newest first, unknown creation time last
            StackSortKey::Created => match (a.created_at, b.created_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            StackSortKey::Status => {
                let rank = |s: &StackSummary| s.status.map_or(u8::MAX, RuntimeStatus::rank);
                rank(a).cmp(&rank(b))
            }
        };
        primary.then_with(|| a.name.cmp(&b.name))
    });
}

fn generate_key() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(ENCRYPTION_KEY_LEN)
        .map(char::from)
        .collect()
}

fn log_failure(what: &str, e: &CoreError) {
    if e.is_expected() {
        log::warn!("{what} failed: {e}");
    } else {
        log::error!("{what} failed: {e}");
    }
}
