//! Stack related type definitions

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stackwiz_provider::DnsRecord;
use super::response::ErrorPayload;
use crate::error::CoreError;

/// Stack archetype
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    /// Any image behind the reverse proxy; image and port supplied by the caller
    #[default]
    Generic,
    /// `PocketBase` backend with fixed image, port, volumes and health probe
    Pocketbase,
}

impl StackKind {
    pub const ALL: [Self; 2] = [Self::Generic, Self::Pocketbase];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Pocketbase => "pocketbase",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "pocketbase" => Ok(Self::Pocketbase),
            other => Err(format!("unknown stack type: {other}")),
        }
    }
}

/// Declarative description of a desired stack, as supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    pub name: String,
    #[serde(default)]
    pub kind: StackKind,
    /// Defaults to `{name}.{default-domain}`
    pub domain: Option<String>,
    pub image: Option<String>,
    /// Raw so that out-of-range values reach the validator instead of failing deserialization
    pub port: Option<i64>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub network: Option<String>,
    pub entrypoint: Option<String>,
    pub certresolver: Option<String>,
    /// Create an `A` record pointing at this server (default off)
    pub create_dns: Option<bool>,
    /// Bring the stack up right after materializing it (default from config)
    pub auto_start: Option<bool>,
    /// Proxy flag for the created record (default from config)
    pub proxied: Option<bool>,
}

/// Stack identity and parameters after validation and defaulting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedStack {
    pub name: String,
    pub kind: StackKind,
    pub domain: String,
    pub image: String,
    pub port: u16,
    pub environment: BTreeMap<String, String>,
    pub network: String,
    pub entrypoint: String,
    pub certresolver: String,
}

/// A rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating a [`StackSpec`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
    /// Field name to suggested replacement value
    pub suggestions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<ValidatedStack>,
}

impl ValidationReport {
    /// `field: message; ...`
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Runtime status of a stack, derived on demand and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Running,
    Stopped,
    /// Materialized but never started, or only partially up
    Created,
    /// Runtime query failed or reported an unrecognized state
    Error,
    /// No stack directory
    Missing,
}

impl RuntimeStatus {
    /// Position when sorting listings by status
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Stopped => 1,
            Self::Created => 2,
            Self::Error => 3,
            Self::Missing => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Created => "created",
            Self::Error => "error",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle action accepted by `manage_stack`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackAction {
    Start,
    Stop,
    Restart,
    Remove,
    Logs,
}

impl StackAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Remove => "remove",
            Self::Logs => "logs",
        }
    }
}

impl fmt::Display for StackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "remove" => Ok(Self::Remove),
            "logs" => Ok(Self::Logs),
            other => Err(format!(
                "unknown action '{other}' (expected start, stop, restart, remove or logs)"
            )),
        }
    }
}

/// Options for `manage_stack`
#[derive(Debug, Clone, Default)]
pub struct ManageOptions {
    /// `logs` only, 1..=10000
    pub tail_lines: Option<u32>,
    /// `logs` only
    pub service: Option<String>,
    /// `remove` only: delete volume directories instead of archiving them
    pub purge_volumes: bool,
    /// `remove` only: allow system stacks and continue past a failing `down`
    pub force: bool,
}

/// Result of a lifecycle action
#[derive(Debug, Clone, Serialize)]
pub struct ManageOutcome {
    pub name: String,
    pub action: StackAction,
    /// `false` when the stack was already in the requested state
    pub performed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RuntimeStatus>,
}

/// Stack as read back from disk
#[derive(Debug, Clone, Serialize)]
pub struct StackRecord {
    pub name: String,
    pub kind: StackKind,
    pub path: PathBuf,
    pub manifest_path: PathBuf,
    pub domain: Option<String>,
    pub image: Option<String>,
    pub port: Option<u16>,
    #[serde(skip)]
    pub environment: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One `list_stacks` entry
#[derive(Debug, Clone, Serialize)]
pub struct StackSummary {
    pub name: String,
    pub kind: StackKind,
    pub domain: Option<String>,
    pub image: Option<String>,
    pub port: Option<u16>,
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RuntimeStatus>,
}

impl From<StackRecord> for StackSummary {
    fn from(record: StackRecord) -> Self {
        Self {
            name: record.name,
            kind: record.kind,
            domain: record.domain,
            image: record.image,
            port: record.port,
            path: record.path,
            created_at: record.created_at,
            status: None,
        }
    }
}

/// Listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackSortKey {
    #[default]
    Name,
    /// Newest first
    Created,
    Status,
}

impl FromStr for StackSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "created" => Ok(Self::Created),
            "status" => Ok(Self::Status),
            other => Err(format!(
                "unknown sort key '{other}' (expected name, created or status)"
            )),
        }
    }
}

/// `list_stacks` parameters
#[derive(Debug, Clone)]
pub struct ListStacksQuery {
    /// Case-insensitive substring of the stack name
    pub filter: Option<String>,
    pub sort_by: StackSortKey,
    pub include_status: bool,
}

impl Default for ListStacksQuery {
    fn default() -> Self {
        Self {
            filter: None,
            sort_by: StackSortKey::Name,
            include_status: true,
        }
    }
}

/// Outcome of one stage of stack creation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Failed { error: ErrorPayload },
    Skipped,
}

impl StageOutcome {
    #[must_use]
    pub fn failed(error: &CoreError) -> Self {
        Self::Failed {
            error: ErrorPayload::from(error),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-stage outcomes of `create_stack`, so callers can resume the stage that failed
#[derive(Debug, Clone, Serialize)]
pub struct CreateStages {
    pub materialize: StageOutcome,
    pub start: StageOutcome,
    pub dns: StageOutcome,
}

impl Default for CreateStages {
    fn default() -> Self {
        Self {
            materialize: StageOutcome::Skipped,
            start: StageOutcome::Skipped,
            dns: StageOutcome::Skipped,
        }
    }
}

/// Result of `create_stack`
#[derive(Debug, Clone, Serialize)]
pub struct CreateStackOutcome {
    pub name: String,
    pub kind: StackKind,
    pub domain: String,
    pub url: String,
    pub path: PathBuf,
    pub stages: CreateStages,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_record: Option<DnsRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    pub warnings: Vec<String>,
}

impl CreateStackOutcome {
    /// `true` when no stage failed
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !(self.stages.materialize.is_failed()
            || self.stages.start.is_failed()
            || self.stages.dns.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rank_orders_running_first() {
        let mut statuses = vec![
            RuntimeStatus::Missing,
            RuntimeStatus::Error,
            RuntimeStatus::Running,
            RuntimeStatus::Created,
            RuntimeStatus::Stopped,
        ];
        statuses.sort_by_key(|s| s.rank());
        assert_eq!(
            statuses,
            vec![
                RuntimeStatus::Running,
                RuntimeStatus::Stopped,
                RuntimeStatus::Created,
                RuntimeStatus::Error,
                RuntimeStatus::Missing,
            ]
        );
    }

    #[test]
    fn action_parses_case_insensitively() {
        assert_eq!("Restart".parse::<StackAction>(), Ok(StackAction::Restart));
        assert!("destroy".parse::<StackAction>().is_err());
    }

    #[test]
    fn spec_deserializes_camel_case_with_defaults() {
        let spec: StackSpec = serde_json::from_str(
            r#"{"name":"redis-cache","image":"redis:7","port":6379,"createDns":true}"#,
        )
        .unwrap();
        assert_eq!(spec.kind, StackKind::Generic);
        assert_eq!(spec.create_dns, Some(true));
        assert!(spec.auto_start.is_none());
        assert!(spec.environment.is_empty());
    }

    #[test]
    fn stage_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StageOutcome::Skipped).unwrap();
        assert_eq!(json["status"], "skipped");
    }

    #[test]
    fn report_summary_joins_fields() {
        let report = ValidationReport {
            errors: vec![
                FieldError::new("name", "must not be empty"),
                FieldError::new("port", "out of range"),
            ],
            ..ValidationReport::default()
        };
        assert_eq!(report.summary(), "name: must not be empty; port: out of range");
    }
}
