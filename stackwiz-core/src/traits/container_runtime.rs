//! Container runtime abstract Trait

use std::path::Path;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::RuntimeStatus;

/// Captured output of a successful runtime invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Compose-style container runtime driven through a manifest file.
///
/// Every call runs with the working directory fixed to `stack_dir` and is bounded by a timeout.
/// Implementations never retry; whether to retry is the caller's decision.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start the stack's containers in the background
    async fn up(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RunOutput>;

    /// Stop and remove the containers; `purge_volumes` also removes named volumes
    async fn down(&self, stack_dir: &Path, manifest: &Path, purge_volumes: bool)
        -> CoreResult<RunOutput>;

    /// Stop the containers, keeping them for the next `up`
    async fn stop(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RunOutput>;

    async fn restart(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RunOutput>;

    /// Last `tail_lines` log lines, optionally for a single service
    async fn logs(
        &self,
        stack_dir: &Path,
        manifest: &Path,
        service: Option<&str>,
        tail_lines: u32,
    ) -> CoreResult<String>;

    /// Current status derived from the runtime's container listing.
    ///
    /// An `Err` means the query itself failed; callers report it as [`RuntimeStatus::Error`].
    async fn status(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RuntimeStatus>;

    /// Runtime version, used as a reachability probe
    async fn version(&self) -> CoreResult<String>;
}
