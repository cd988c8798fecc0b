//! StackWiz Core Library
//!
//! Stack lifecycle orchestration and DNS reconciliation for a single Docker host behind Traefik:
//! - Stack validation and manifest rendering ([`validation`], [`template`])
//! - On-disk stack store with permission policy ([`store`])
//! - Compose runtime driver ([`runtime`])
//! - DNS client with zone caching and token discovery ([`services::DnsService`], [`credentials`])
//! - Create / list / manage orchestration ([`services::StackService`]) and health checks
//! - Read-only stack, template and domain views ([`services::CatalogService`])
//!
//! The library is transport-agnostic; every operation is a plain async call and failures are
//! [`CoreError`]s that map onto a small caller-facing taxonomy ([`ErrorCategory`]).

pub mod config;
pub mod credentials;
pub mod error;
pub mod runtime;
pub mod services;
pub mod store;
pub mod template;
pub mod traits;
pub mod types;
pub mod utils;
pub mod validation;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use config::StackwizConfig;
pub use error::{CoreError, CoreResult, ErrorCategory};
pub use services::{CatalogService, DnsService, HealthService, ServiceContext, StackService};
pub use traits::{Clock, ContainerRuntime, PublicIpResolver};
pub use types::{ErrorPayload, OperationResult};
