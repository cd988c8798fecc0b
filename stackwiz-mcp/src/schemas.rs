//! MCP tool parameter schemas
//!
//! Defines the input parameter structures for all MCP tools.
//! All structs derive `Debug`, `Deserialize`, and `JsonSchema` as required by rmcp.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;

use stackwiz_core::types::{StackKind, StackSpec};
use stackwiz_core::{CoreError, CoreResult};

/// Stack description shared by `create_stack` and `validate_stack_config`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StackParams {
    /// Stack name (lowercase letters, digits and hyphens).
    #[schemars(description = "Stack name: lowercase letters, digits and hyphens, 1-63 chars; infrastructure names (traefik, monitoring, supabase, adguard, docs) are reserved")]
    pub name: String,

    /// Stack archetype.
    #[serde(rename = "type")]
    #[schemars(description = "Stack type: generic (default) or pocketbase")]
    pub stack_type: Option<String>,

    #[schemars(description = "Docker image with tag (required for generic stacks)")]
    pub image: Option<String>,

    #[schemars(description = "Container port to route to (required for generic stacks)")]
    pub port: Option<i64>,

    #[schemars(description = "Public domain (default: {name}.{default domain})")]
    pub domain: Option<String>,

    #[schemars(description = "Extra environment variables written to the stack's .env")]
    pub environment: Option<BTreeMap<String, String>>,

    #[schemars(description = "Reverse-proxy network (default from server config)")]
    pub network: Option<String>,

    #[schemars(description = "Traefik entrypoint (default from server config)")]
    pub entrypoint: Option<String>,

    #[schemars(description = "Traefik certificate resolver (default from server config)")]
    pub certresolver: Option<String>,

    #[schemars(description = "Create an A record pointing at this server (default: false)")]
    pub create_dns: Option<bool>,

    #[schemars(description = "Start the stack after creating it (default from server config)")]
    pub auto_start: Option<bool>,

    #[schemars(description = "Proxy the created DNS record (default from server config)")]
    pub proxied: Option<bool>,
}

impl StackParams {
    /// Convert into the core stack description; an unknown type is a validation error.
    pub fn into_spec(self) -> CoreResult<StackSpec> {
        let kind = match self.stack_type.as_deref() {
            None => StackKind::default(),
            Some(raw) => raw.parse().map_err(CoreError::ValidationError)?,
        };
        Ok(StackSpec {
            name: self.name,
            kind,
            domain: self.domain,
            image: self.image,
            port: self.port,
            environment: self.environment.unwrap_or_default(),
            network: self.network,
            entrypoint: self.entrypoint,
            certresolver: self.certresolver,
            create_dns: self.create_dns,
            auto_start: self.auto_start,
            proxied: self.proxied,
        })
    }
}

/// Parameters for `create_stack` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateStackParams {
    #[serde(flatten)]
    pub stack: StackParams,
}

/// Parameters for `list_stacks` tool.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListStacksParams {
    #[schemars(description = "Case-insensitive substring of the stack name")]
    pub filter: Option<String>,

    #[schemars(description = "Sort order: name (default), created (newest first) or status")]
    pub sort_by: Option<String>,

    #[schemars(description = "Query the container runtime for each stack's status (default: true)")]
    pub include_status: Option<bool>,
}

/// Parameters for `manage_stack` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ManageStackParams {
    #[schemars(description = "Stack name")]
    pub name: String,

    #[schemars(description = "Action: start, stop, restart, remove or logs")]
    pub action: String,

    /// Number of log lines (logs only).
    #[schemars(description = "Number of log lines for the logs action (1-10000, default: 100)")]
    pub tail_lines: Option<u32>,

    #[schemars(description = "Only show logs of this compose service (logs only)")]
    pub service: Option<String>,

    #[schemars(description = "Delete volume data instead of archiving it (remove only)")]
    pub purge_volumes: Option<bool>,

    #[schemars(
        description = "Remove system stacks and continue when stopping containers fails (remove only)"
    )]
    pub force: Option<bool>,
}

/// Parameters for `create_dns_record` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDnsRecordParams {
    #[schemars(description = "Subdomain; omit or use @ for the domain itself")]
    pub subdomain: Option<String>,

    #[schemars(description = "Domain or full hostname the record belongs to")]
    pub domain: String,

    #[serde(rename = "type")]
    #[schemars(description = "Record type: A (default), AAAA, CNAME, MX, TXT, NS, SRV, CAA")]
    pub record_type: Option<String>,

    #[schemars(description = "Record value; AUTO (default) uses this server's public IP")]
    pub value: Option<String>,

    #[schemars(description = "Enable the provider proxy (A/AAAA/CNAME only, default from config)")]
    pub proxied: Option<bool>,

    #[schemars(description = "TTL in seconds, 1 = automatic (default from config)")]
    pub ttl: Option<u32>,

    #[schemars(description = "MX priority")]
    pub priority: Option<u16>,
}

/// Parameters for `list_dns_records` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDnsRecordsParams {
    #[schemars(description = "Domain whose zone is listed")]
    pub domain: String,

    #[schemars(description = "Case-insensitive substring of the record name")]
    pub filter: Option<String>,
}

/// Parameters for `update_dns_proxy` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateDnsProxyParams {
    #[schemars(description = "Subdomain; omit or use @ for the domain itself")]
    pub subdomain: Option<String>,

    #[schemars(description = "Domain or full hostname")]
    pub domain: String,

    #[schemars(description = "true to enable the proxy, false to disable it")]
    pub enabled: bool,
}

/// Parameters for `delete_dns_record` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteDnsRecordParams {
    #[schemars(description = "Subdomain; omit or use @ for the domain itself")]
    pub subdomain: Option<String>,

    #[schemars(description = "Domain or full hostname")]
    pub domain: String,

    #[serde(rename = "type")]
    #[schemars(description = "Only delete records of this type (default: all types)")]
    pub record_type: Option<String>,
}

/// Parameters for `validate_stack_config` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateStackConfigParams {
    #[serde(flatten)]
    pub stack: StackParams,

    #[schemars(
        description = "Also check for name, domain and port conflicts with existing stacks (default: true)"
    )]
    pub check_conflicts: Option<bool>,
}

/// Parameters for `health_check` tool.
///
/// This tool takes no parameters, but we need an empty struct for the schema.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HealthCheckParams {}

/// Hostname addressed by an optional subdomain and a domain
pub fn hostname(subdomain: Option<&str>, domain: &str) -> String {
    match subdomain.map(str::trim) {
        None | Some("" | "@") => domain.trim().to_string(),
        Some(sub) => format!("{sub}.{}", domain.trim()),
    }
}
