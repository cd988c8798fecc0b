//! Server public IP resolver trait

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::CoreResult;

/// Detects the public address of the host running the stacks.
///
/// The result replaces the `AUTO` record value.
#[async_trait]
pub trait PublicIpResolver: Send + Sync {
    /// First valid address, or `IpDetectionFailed` when no source produced one
    async fn resolve(&self) -> CoreResult<IpAddr>;
}
