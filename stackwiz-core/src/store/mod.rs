//! Filesystem stack store
//!
//! One directory per stack under the configured base directory. Directory creation is the
//! exclusivity point for stack names: `materialize` uses a non-recursive `create_dir`, so of two
//! concurrent creates for the same name exactly one succeeds.

mod permissions;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::config::StackwizConfig;
use crate::error::{CoreError, CoreResult};
use crate::template::{RenderedStack, TemplateOverrides};
use crate::types::{StackKind, StackRecord};
use crate::utils::env_file::parse_env;

pub use permissions::{
    lookup_gid, lookup_uid, Ownership, ENV_FILE_MODE, MANIFEST_MODE, STACK_DIR_MODE,
    VOLUME_DIR_MODE,
};

pub const MANIFEST_FILE: &str = "docker-compose.yml";
pub const ENV_FILE: &str = ".env";
/// Manifest names recognized in existing stack directories, in lookup order
pub const MANIFEST_CANDIDATES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];
/// Infrastructure stacks that are never listed and only removed with `force`
pub const SYSTEM_STACKS: [&str; 5] = ["traefik", "monitoring", "supabase", "adguard", "docs"];
pub const ARCHIVE_DIR: &str = "_archive";

/// Paths written by [`FsStackStore::materialize`]
#[derive(Debug, Clone)]
pub struct MaterializedStack {
    pub path: PathBuf,
    pub manifest_path: PathBuf,
    pub env_path: PathBuf,
    /// Permission policy problems; the stack is still considered created
    pub warnings: Vec<String>,
}

/// Result of [`FsStackStore::remove`]
#[derive(Debug, Clone)]
pub struct RemovedStack {
    pub path: PathBuf,
    /// Where preserved volume directories were moved
    pub archived_to: Option<PathBuf>,
}

pub struct FsStackStore {
    base_dir: PathBuf,
    templates_dir: PathBuf,
    user: Option<String>,
    group: Option<String>,
    manage_ownership: bool,
}

impl FsStackStore {
    #[must_use]
    pub fn new(config: &StackwizConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            templates_dir: config.templates_dir.clone(),
            user: config.default_user.clone(),
            group: config.default_group.clone(),
            manage_ownership: config.manage_ownership,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// System stacks and `_`/`.` prefixed directories
    #[must_use]
    pub fn is_system_stack(name: &str) -> bool {
        SYSTEM_STACKS.contains(&name) || name.starts_with('_') || name.starts_with('.')
    }

    /// Directory for `name`; rejects anything that would escape the base directory
    pub fn stack_dir(&self, name: &str) -> CoreResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name.contains('\0')
        {
            return Err(CoreError::ValidationError(format!(
                "'{name}' is not a valid stack directory name"
            )));
        }
        Ok(self.base_dir.join(name))
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.stack_dir(name) {
            Ok(dir) => tokio::fs::try_exists(dir).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn ensure_base_dir(&self) -> CoreResult<()> {
        match tokio::fs::metadata(&self.base_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CoreError::ConfigurationError(format!(
                "base directory {} is not a directory",
                self.base_dir.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CoreError::ConfigurationError(
                format!("base directory {} does not exist", self.base_dir.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the stack directory exclusively and write the rendered files into it.
    pub async fn materialize(
        &self,
        name: &str,
        rendered: &RenderedStack,
        volume_dirs: &[&str],
    ) -> CoreResult<MaterializedStack> {
        self.ensure_base_dir().await?;
        let dir = self.stack_dir(name)?;

        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(CoreError::StackExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let env_path = dir.join(ENV_FILE);

        let written = async {
            write_new(&manifest_path, &rendered.manifest).await?;
            write_new(&env_path, &rendered.env).await?;
            for volume in volume_dirs {
                tokio::fs::create_dir(dir.join(volume)).await?;
            }
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(e) = written {
            // The directory is ours alone; do not leave a half-written stack behind
            if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                log::error!(
                    "Failed to clean up {} after write error: {cleanup}",
                    dir.display()
                );
            }
            return Err(CoreError::IoError(format!(
                "failed to write stack {name}: {e}"
            )));
        }

        let warnings = self
            .apply_policy(&dir, &manifest_path, &env_path, volume_dirs)
            .await;
        for warning in &warnings {
            log::warn!("Stack {name}: {warning}");
        }

        log::info!("Materialized stack {name} at {}", dir.display());
        Ok(MaterializedStack {
            path: dir,
            manifest_path,
            env_path,
            warnings,
        })
    }

    /// Apply modes and ownership. Failures are collected, never fatal.
    async fn apply_policy(
        &self,
        dir: &Path,
        manifest: &Path,
        env: &Path,
        volume_dirs: &[&str],
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let volumes: Vec<PathBuf> = volume_dirs.iter().map(|v| dir.join(v)).collect();

        let mut targets: Vec<(&Path, u32)> = vec![
            (dir, STACK_DIR_MODE),
            (manifest, MANIFEST_MODE),
            (env, ENV_FILE_MODE),
        ];
        targets.extend(volumes.iter().map(|v| (v.as_path(), VOLUME_DIR_MODE)));

        for (path, mode) in &targets {
            if let Err(e) = permissions::set_mode(path, *mode).await {
                warnings.push(format!(
                    "could not set mode {mode:o} on {}: {e}",
                    path.display()
                ));
            }
        }

        if self.manage_ownership {
            let ownership = permissions::resolve_ownership(
                self.user.as_deref(),
                self.group.as_deref(),
                &mut warnings,
            );
            if !ownership.is_empty() {
                for (path, _) in &targets {
                    if let Err(e) = permissions::chown(path, ownership) {
                        warnings.push(format!("could not chown {}: {e}", path.display()));
                    }
                }
            }
        }

        warnings
    }

    /// Delete the stack directory. Unless `purge_volumes`, existing volume directories are first
    /// moved to `{base}/_archive/{name}-{unix-seconds}/`.
    pub async fn remove(
        &self,
        name: &str,
        purge_volumes: bool,
        volume_dirs: &[&str],
    ) -> CoreResult<RemovedStack> {
        let dir = self.stack_dir(name)?;
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(CoreError::StackNotFound(name.to_string()));
        }

        let mut archived_to = None;
        if !purge_volumes {
            let mut present = Vec::new();
            for volume in volume_dirs {
                let path = dir.join(volume);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    present.push((*volume, path));
                }
            }
            if !present.is_empty() {
                let archive = self
                    .base_dir
                    .join(ARCHIVE_DIR)
                    .join(format!("{name}-{}", Utc::now().timestamp()));
                tokio::fs::create_dir_all(&archive).await?;
                for (volume, path) in present {
                    tokio::fs::rename(&path, archive.join(volume)).await?;
                }
                log::info!("Archived volumes of {name} to {}", archive.display());
                archived_to = Some(archive);
            }
        }

        tokio::fs::remove_dir_all(&dir).await?;
        log::info!("Removed stack directory {}", dir.display());

        Ok(RemovedStack {
            path: dir,
            archived_to,
        })
    }

    /// First recognized manifest in `dir`
    pub async fn find_manifest(dir: &Path) -> Option<PathBuf> {
        for candidate in MANIFEST_CANDIDATES {
            let path = dir.join(candidate);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }

    /// Read a stack back from disk. A directory without a manifest is not a stack.
    pub async fn read(&self, name: &str) -> CoreResult<StackRecord> {
        let dir = self.stack_dir(name)?;
        let meta = match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => meta,
            Ok(_) => return Err(CoreError::StackNotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CoreError::StackNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let manifest_path = Self::find_manifest(&dir)
            .await
            .ok_or_else(|| CoreError::StackNotFound(name.to_string()))?;

        let environment = match tokio::fs::read_to_string(dir.join(ENV_FILE)).await {
            Ok(content) => parse_env(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Cannot read {}/.env: {e}", dir.display());
                BTreeMap::new()
            }
        };

        let kind = environment
            .get("STACKWIZ_STACK_TYPE")
            .and_then(|k| k.parse::<StackKind>().ok())
            .unwrap_or_default();
        let created_at = meta
            .created()
            .or_else(|_| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(StackRecord {
            name: name.to_string(),
            kind,
            domain: environment.get("APP_DOMAIN").cloned(),
            image: environment.get("APP_IMAGE").cloned(),
            port: environment.get("APP_PORT").and_then(|p| p.parse().ok()),
            path: dir,
            manifest_path,
            environment,
            created_at,
        })
    }

    /// Names of user stacks, sorted. System stacks and directories without a manifest are
    /// skipped.
    pub async fn list_names(&self) -> CoreResult<Vec<String>> {
        self.ensure_base_dir().await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if Self::is_system_stack(&name) {
                continue;
            }
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            if is_dir && Self::find_manifest(&entry.path()).await.is_some() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// `{templates}/{kind}-template.yml` and `{templates}/{kind}-env-template`, when present
    pub async fn load_template_overrides(&self, kind: StackKind) -> CoreResult<TemplateOverrides> {
        let manifest = read_optional(
            &self
                .templates_dir
                .join(format!("{}-template.yml", kind.as_str())),
        )
        .await?;
        let env = read_optional(
            &self
                .templates_dir
                .join(format!("{}-env-template", kind.as_str())),
        )
        .await?;
        Ok(TemplateOverrides { manifest, env })
    }

    /// Write, read back and delete a probe file in the base directory
    pub async fn probe_writable(&self) -> CoreResult<()> {
        self.ensure_base_dir().await?;
        let probe = self
            .base_dir
            .join(format!(".stackwiz-health-{}", uuid::Uuid::new_v4()));
        let content = "ok";
        let result = async {
            tokio::fs::write(&probe, content).await?;
            let read = tokio::fs::read_to_string(&probe).await?;
            if read == content {
                Ok(())
            } else {
                Err(CoreError::IoError(
                    "probe file content mismatch".to_string(),
                ))
            }
        }
        .await;
        let _ = tokio::fs::remove_file(&probe).await;
        result
    }
}

async fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

async fn read_optional(path: &Path) -> CoreResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            log::debug!("Using template override {}", path.display());
            Ok(Some(content))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::ConfigurationError(format!(
            "cannot read template {}: {e}",
            path.display()
        ))),
    }
}
