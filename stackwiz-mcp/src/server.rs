//! MCP Server implementation for StackWiz.
//!
//! Exposes 9 tools for AI agents: stack lifecycle, DNS records, config validation and health.
//! Every tool answers with an [`OperationResult`] envelope; operation failures are reported
//! inside the envelope, never as protocol errors.
//!
//! Read-only stack, template and domain views are served as resources (see [`crate::resources`])
//! and three guided deployment prompts as prompts.

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, CallToolResult, Content, GetPromptRequestParams, GetPromptResult,
        Implementation, ListPromptsResult, ListResourcesResult, PaginatedRequestParams, Prompt,
        PromptMessage, PromptMessageRole, ProtocolVersion, RawResource, ReadResourceRequestParams,
        ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde_json::json;
use std::sync::Arc;

use stackwiz_core::types::{
    CreateStackOutcome, DnsRecordType, ListStacksQuery, ManageOptions, RecordSpec, StackKind,
    StageOutcome, AUTO_VALUE,
};
use stackwiz_core::{
    CatalogService, CoreError, CoreResult, ErrorPayload, HealthService, OperationResult,
    ServiceContext, StackService,
};

use crate::prompts;
use crate::resources::ResourceUri;

use crate::schemas::{
    hostname, CreateDnsRecordParams, CreateStackParams, DeleteDnsRecordParams,
    HealthCheckParams, ListDnsRecordsParams, ListStacksParams, ManageStackParams,
    UpdateDnsProxyParams, ValidateStackConfigParams,
};

/// Sanitize error messages to prevent sensitive information leakage.
///
/// Logs the full error to stderr but returns a generic message to the client.
fn sanitize_internal_error(error: impl std::fmt::Display, context: &str) -> McpError {
    tracing::error!("{context} error: {error}");
    McpError::internal_error(
        format!("{context} failed - check server logs for details"),
        None,
    )
}

/// Turn an operation result into a tool response.
///
/// Failures become `success: false` envelopes flagged as tool errors.
fn respond(tool_name: &str, result: CoreResult<OperationResult>) -> Result<CallToolResult, McpError> {
    let envelope = result.unwrap_or_else(|e| {
        if e.is_expected() {
            tracing::warn!("{tool_name} failed: {e}");
        } else {
            tracing::error!("{tool_name} failed: {e}");
        }
        OperationResult::failure(&e)
    });

    let json = serde_json::to_string_pretty(&envelope)
        .map_err(|e| sanitize_internal_error(e, &format!("Serialize {tool_name} result")))?;

    let content = vec![Content::text(json)];
    Ok(if envelope.success {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    })
}

fn parse_record_type(raw: Option<&str>) -> CoreResult<Option<DnsRecordType>> {
    raw.map(|t| t.parse().map_err(CoreError::ValidationError))
        .transpose()
}

/// Envelope for a finished create: success only when no stage failed
fn create_envelope(outcome: &CreateStackOutcome) -> OperationResult {
    if outcome.succeeded() {
        return OperationResult::success_with(
            format!("Stack {} created, available at {}", outcome.name, outcome.url),
            outcome,
        );
    }

    let stages = [
        ("materialize", &outcome.stages.materialize),
        ("start", &outcome.stages.start),
        ("dns", &outcome.stages.dns),
    ];
    let mut failed = Vec::new();
    let mut first_error: Option<ErrorPayload> = None;
    for (stage, result) in stages {
        if let StageOutcome::Failed { error } = result {
            failed.push(stage);
            first_error.get_or_insert_with(|| error.clone());
        }
    }

    OperationResult::failure_with(
        format!(
            "Stack {} was written to disk but stage(s) failed: {}",
            outcome.name,
            failed.join(", ")
        ),
        outcome,
        first_error,
    )
}

/// MCP Server for StackWiz.
///
/// Provides AI agents with stack orchestration and DNS management
/// through the Model Context Protocol.
#[derive(Clone)]
pub struct StackwizMcp {
    /// Shared dependencies, configuration and counters.
    ctx: Arc<ServiceContext>,
    /// Stack create / list / manage / validate.
    stacks: Arc<StackService>,
    /// Dependency health checks.
    health: Arc<HealthService>,
    /// Read-only views behind the resources.
    catalog: Arc<CatalogService>,
    /// Tool router generated by macro.
    tool_router: ToolRouter<Self>,
}

impl StackwizMcp {
    /// Create a new MCP server instance.
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            stacks: Arc::new(StackService::new(Arc::clone(&ctx))),
            health: Arc::new(HealthService::new(Arc::clone(&ctx))),
            catalog: Arc::new(CatalogService::new(Arc::clone(&ctx))),
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    async fn run_create_stack(&self, params: CreateStackParams) -> CoreResult<OperationResult> {
        let spec = params.stack.into_spec()?;
        let outcome = self.stacks.create_stack(spec).await?;
        Ok(create_envelope(&outcome))
    }

    async fn run_list_stacks(&self, params: ListStacksParams) -> CoreResult<OperationResult> {
        let query = ListStacksQuery {
            filter: params.filter,
            sort_by: match params.sort_by.as_deref() {
                Some(raw) => raw.parse().map_err(CoreError::ValidationError)?,
                None => ListStacksQuery::default().sort_by,
            },
            include_status: params.include_status.unwrap_or(true),
        };
        let stacks = self.stacks.list_stacks(&query).await?;
        Ok(OperationResult::success_with(
            format!("Found {} stack(s)", stacks.len()),
            &json!({ "count": stacks.len(), "stacks": stacks }),
        ))
    }

    async fn run_manage_stack(&self, params: ManageStackParams) -> CoreResult<OperationResult> {
        let action = params.action.parse().map_err(CoreError::ValidationError)?;
        let options = ManageOptions {
            tail_lines: params.tail_lines,
            service: params.service,
            purge_volumes: params.purge_volumes.unwrap_or(false),
            force: params.force.unwrap_or(false),
        };
        let outcome = self
            .stacks
            .manage_stack(&params.name, action, options)
            .await?;
        Ok(OperationResult::success_with(outcome.message.clone(), &outcome))
    }

    async fn run_create_dns_record(
        &self,
        params: CreateDnsRecordParams,
    ) -> CoreResult<OperationResult> {
        let record_type =
            parse_record_type(params.record_type.as_deref())?.unwrap_or(DnsRecordType::A);
        let dns = self.ctx.dns().await?;
        let location = dns
            .locate(&hostname(params.subdomain.as_deref(), &params.domain))
            .await?;

        let defaults = &self.ctx.config.dns;
        let proxied = params
            .proxied
            .unwrap_or(defaults.default_proxied && record_type.supports_proxy());
        let spec = RecordSpec {
            subdomain: location.subdomain.clone(),
            record_type,
            value: params.value.unwrap_or_else(|| AUTO_VALUE.to_string()),
            proxied,
            ttl: params.ttl.unwrap_or(defaults.default_ttl),
            priority: params.priority,
        };
        let record = dns.create_record(&location.zone, spec).await?;

        Ok(OperationResult::success_with(
            format!(
                "Created {} record {} -> {}",
                record.record_type, record.name, record.value
            ),
            &json!({ "zone": location.zone, "record": record }),
        ))
    }

    async fn run_list_dns_records(
        &self,
        params: ListDnsRecordsParams,
    ) -> CoreResult<OperationResult> {
        let dns = self.ctx.dns().await?;
        let zone = dns.resolve_zone(&params.domain).await?;
        let records = dns
            .list_records(&zone, params.filter.as_deref())
            .collect()
            .await?;
        Ok(OperationResult::success_with(
            format!("Found {} record(s) in {}", records.len(), zone.name),
            &json!({ "zone": zone, "count": records.len(), "records": records }),
        ))
    }

    async fn run_update_dns_proxy(
        &self,
        params: UpdateDnsProxyParams,
    ) -> CoreResult<OperationResult> {
        let dns = self.ctx.dns().await?;
        let location = dns
            .locate(&hostname(params.subdomain.as_deref(), &params.domain))
            .await?;
        let records = dns
            .update_proxy_flag(&location.zone, &location.subdomain, params.enabled)
            .await?;
        Ok(OperationResult::success_with(
            format!(
                "Proxy {} for {} record(s) at {}",
                if params.enabled { "enabled" } else { "disabled" },
                records.len(),
                location.fqdn
            ),
            &json!({ "zone": location.zone, "records": records }),
        ))
    }

    async fn run_delete_dns_record(
        &self,
        params: DeleteDnsRecordParams,
    ) -> CoreResult<OperationResult> {
        let record_type = parse_record_type(params.record_type.as_deref())?;
        let dns = self.ctx.dns().await?;
        let location = dns
            .locate(&hostname(params.subdomain.as_deref(), &params.domain))
            .await?;
        let deleted = dns
            .delete_record(&location.zone, &location.subdomain, record_type)
            .await?;
        Ok(OperationResult::success_with(
            format!("Deleted {} record(s) at {}", deleted.len(), location.fqdn),
            &json!({ "zone": location.zone, "deleted": deleted }),
        ))
    }

    async fn run_validate_stack_config(
        &self,
        params: ValidateStackConfigParams,
    ) -> CoreResult<OperationResult> {
        let spec = params.stack.into_spec()?;
        let report = self
            .stacks
            .validate_stack_config(&spec, params.check_conflicts.unwrap_or(true))
            .await?;
        let message = if report.valid {
            format!(
                "Configuration for {} is valid ({} warning(s))",
                spec.name,
                report.warnings.len()
            )
        } else {
            format!("Configuration is invalid: {}", report.summary())
        };
        Ok(OperationResult::success_with(message, &report))
    }

    async fn run_health_check(&self) -> OperationResult {
        let report = self.health.check().await;
        if report.healthy {
            return OperationResult::success_with("Server is healthy", &report);
        }
        let failing = report
            .checks
            .iter()
            .filter(|c| c.critical && !c.healthy)
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect::<Vec<_>>()
            .join("; ");
        OperationResult::failure_with(format!("Server is unhealthy - {failing}"), &report, None)
    }
}

impl StackwizMcp {
    /// Every readable resource: the fixed views plus three per existing stack
    pub(crate) async fn resource_index(&self) -> Result<Vec<Resource>, McpError> {
        let names = self
            .ctx
            .store
            .list_names()
            .await
            .map_err(|e| sanitize_internal_error(e, "List resources"))?;

        let mut uris = vec![ResourceUri::StackList, ResourceUri::TemplateList];
        uris.extend(StackKind::ALL.map(ResourceUri::Template));
        uris.push(ResourceUri::Domains);
        uris.extend(names.iter().flat_map(|name| ResourceUri::for_stack(name)));

        Ok(uris
            .into_iter()
            .map(|uri| {
                let mut raw = RawResource::new(uri.to_string(), uri.title());
                raw.description = Some(uri.description().to_string());
                raw.mime_type = Some(uri.mime_type().to_string());
                raw.no_annotation()
            })
            .collect())
    }

    /// Body of one resource: YAML for compose files, pretty JSON otherwise
    pub(crate) async fn read_resource_text(&self, uri: &str) -> Result<String, McpError> {
        let parsed: ResourceUri = uri
            .parse()
            .map_err(|e: String| McpError::resource_not_found(e, None))?;
        self.render_resource(&parsed).await.map_err(|e| match e {
            CoreError::StackNotFound(_) | CoreError::ValidationError(_) => {
                tracing::warn!("Read {uri} failed: {e}");
                McpError::resource_not_found(e.to_string(), None)
            }
            other => sanitize_internal_error(other, &format!("Read {uri}")),
        })
    }

    async fn render_resource(&self, uri: &ResourceUri) -> CoreResult<String> {
        let value = match uri {
            ResourceUri::StackCompose(name) => return self.catalog.stack_manifest(name).await,
            ResourceUri::StackList => {
                let query = ListStacksQuery {
                    include_status: true,
                    ..ListStacksQuery::default()
                };
                let stacks = self.stacks.list_stacks(&query).await?;
                json!({ "count": stacks.len(), "stacks": stacks })
            }
            ResourceUri::StackEnv(name) => json!(self.catalog.stack_environment(name).await?),
            ResourceUri::StackStatus(name) => json!(self.catalog.stack_status(name).await?),
            ResourceUri::TemplateList => {
                let templates: Vec<_> = self
                    .catalog
                    .templates()
                    .await?
                    .into_iter()
                    .map(|t| {
                        json!({
                            "type": t.kind,
                            "uri": ResourceUri::Template(t.kind).to_string(),
                            "manifest_source": t.manifest_source,
                            "env_source": t.env_source,
                        })
                    })
                    .collect();
                json!(templates)
            }
            ResourceUri::Template(kind) => json!(self.catalog.template(*kind).await?),
            ResourceUri::Domains => json!(self.catalog.domains().await?),
        };
        serde_json::to_string_pretty(&value)
            .map_err(|e| CoreError::IoError(format!("serialize {uri}: {e}")))
    }
}

#[tool_router]
impl StackwizMcp {
    /// Create a stack.
    #[tool(
        description = "Create a Docker Compose stack behind Traefik (generic image or pocketbase backend), optionally start it and create its DNS record"
    )]
    async fn create_stack(
        &self,
        Parameters(params): Parameters<CreateStackParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("Create stack", self.run_create_stack(params).await)
    }

    /// List existing stacks.
    #[tool(description = "List stacks on this host with type, domain, port and runtime status")]
    async fn list_stacks(
        &self,
        Parameters(params): Parameters<ListStacksParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("List stacks", self.run_list_stacks(params).await)
    }

    /// Run a lifecycle action.
    #[tool(description = "Start, stop, restart or remove a stack, or fetch its logs")]
    async fn manage_stack(
        &self,
        Parameters(params): Parameters<ManageStackParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("Manage stack", self.run_manage_stack(params).await)
    }

    /// Create a DNS record.
    #[tool(
        description = "Create a DNS record; value AUTO points A/AAAA records at this server's public IP"
    )]
    async fn create_dns_record(
        &self,
        Parameters(params): Parameters<CreateDnsRecordParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("Create DNS record", self.run_create_dns_record(params).await)
    }

    /// List DNS records.
    #[tool(description = "List DNS records in the zone of a domain, optionally filtered by name")]
    async fn list_dns_records(
        &self,
        Parameters(params): Parameters<ListDnsRecordsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("List DNS records", self.run_list_dns_records(params).await)
    }

    /// Toggle the DNS proxy.
    #[tool(description = "Enable or disable the provider proxy on the A/AAAA/CNAME records of a hostname")]
    async fn update_dns_proxy(
        &self,
        Parameters(params): Parameters<UpdateDnsProxyParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("Update DNS proxy", self.run_update_dns_proxy(params).await)
    }

    /// Delete DNS records.
    #[tool(description = "Delete the DNS records of a hostname, optionally only one record type")]
    async fn delete_dns_record(
        &self,
        Parameters(params): Parameters<DeleteDnsRecordParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("Delete DNS record", self.run_delete_dns_record(params).await)
    }

    /// Validate a stack description.
    #[tool(
        description = "Validate a stack configuration without creating anything; reports errors, warnings, suggestions and conflicts"
    )]
    async fn validate_stack_config(
        &self,
        Parameters(params): Parameters<ValidateStackConfigParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond(
            "Validate stack config",
            self.run_validate_stack_config(params).await,
        )
    }

    /// Check server health.
    #[tool(
        description = "Check container runtime, filesystem, DNS credentials and templates; reports uptime and operations served"
    )]
    async fn health_check(
        &self,
        _params: Parameters<HealthCheckParams>,
    ) -> Result<CallToolResult, McpError> {
        self.ctx.record_operation();
        respond("Health check", Ok(self.run_health_check().await))
    }
}

#[tool_handler]
impl ServerHandler for StackwizMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "StackWiz MCP Server - Create and manage Docker Compose stacks behind Traefik \
                 and keep their Cloudflare DNS records in sync. \
                 Use validate_stack_config before create_stack, list_stacks to see what exists, \
                 and manage_stack to start, stop, restart, remove or read logs. \
                 DNS tools (create_dns_record, list_dns_records, update_dns_proxy, delete_dns_record) \
                 need a Cloudflare API token. Every tool returns {success, message, details, error}. \
                 Resources: stack://list, stack://{name}/compose|env|status, template://list, \
                 template://{type}, infra://domains."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resource_index().await?))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read_resource_text(&request.uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        let prompts = prompts::PROMPTS
            .iter()
            .map(|p| Prompt::new(p.name, Some(p.description), None))
            .collect();
        Ok(ListPromptsResult::with_all_items(prompts))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let prompt = prompts::find(&request.name).ok_or_else(|| {
            McpError::invalid_params(format!("unknown prompt: {}", request.name), None)
        })?;
        Ok(GetPromptResult {
            description: Some(prompt.description.to_string()),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, prompt.text)],
        })
    }
}

#[cfg(test)]
#[path = "test_mocks.rs"]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod test_mocks;

#[cfg(test)]
#[path = "server_tests.rs"]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests;

#[cfg(test)]
#[path = "client_integration_tests.rs"]
#[allow(clippy::unwrap_used, clippy::panic, clippy::expect_used)]
mod client_integration_tests;
