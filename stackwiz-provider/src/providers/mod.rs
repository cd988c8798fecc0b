//! DNS provider implementations

pub(crate) mod common;
mod cloudflare;

pub use cloudflare::CloudflareProvider;
pub use common::{full_name_to_relative, normalize_domain_name, relative_to_full_name};
