//! Type definition module

mod dns;
mod response;
mod stack;

pub use dns::{RecordLocation, RecordSpec, Zone, AUTO_VALUE};
pub use response::{ErrorPayload, OperationResult};
pub use stack::{
    CreateStackOutcome, CreateStages, FieldError, ListStacksQuery, ManageOptions, ManageOutcome,
    RuntimeStatus, StackAction, StackKind, StackRecord, StackSortKey, StackSpec, StackSummary,
    StageOutcome, ValidatedStack, ValidationReport,
};

// Re-export provider library public types
pub use stackwiz_provider::{DnsRecord, DnsRecordType, RecordQueryParams};
