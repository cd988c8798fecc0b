//! Read-only views of stacks, templates and served domains

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use stackwiz_provider::log_sanitizer::mask_secret;

use crate::error::CoreResult;
use crate::services::ServiceContext;
use crate::template::{self, TemplateOverrides};
use crate::types::{RuntimeStatus, StackKind, StackSummary};

/// Environment keys whose values are masked when read back
const SECRET_KEY_MARKERS: [&str; 5] = ["KEY", "SECRET", "TOKEN", "PASSWORD", "PASS"];

/// Where a template comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSource {
    Builtin,
    Override,
}

/// Effective manifest and environment templates for one archetype
#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
    pub kind: StackKind,
    pub manifest_source: TemplateSource,
    pub env_source: TemplateSource,
    pub volume_dirs: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_image: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_port: Option<u16>,
    pub manifest: String,
    pub env: String,
}

pub struct CatalogService {
    ctx: Arc<ServiceContext>,
}

impl CatalogService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Manifest text exactly as stored
    pub async fn stack_manifest(&self, name: &str) -> CoreResult<String> {
        let record = self.ctx.store.read(name).await?;
        Ok(tokio::fs::read_to_string(&record.manifest_path).await?)
    }

    /// Environment file entries, with secret-looking values masked
    pub async fn stack_environment(&self, name: &str) -> CoreResult<BTreeMap<String, String>> {
        let record = self.ctx.store.read(name).await?;
        Ok(record
            .environment
            .into_iter()
            .map(|(key, value)| {
                let upper = key.to_ascii_uppercase();
                if SECRET_KEY_MARKERS.iter().any(|m| upper.contains(m)) {
                    (key, mask_secret(&value))
                } else {
                    (key, value)
                }
            })
            .collect())
    }

    /// Stored metadata plus live runtime status. A failed status query reads as `error`.
    pub async fn stack_status(&self, name: &str) -> CoreResult<StackSummary> {
        let record = self.ctx.store.read(name).await?;
        let status = match self
            .ctx
            .runtime
            .status(&record.path, &record.manifest_path)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                log::warn!("Status of stack {name} unavailable: {e}");
                RuntimeStatus::Error
            }
        };
        Ok(StackSummary {
            status: Some(status),
            ..StackSummary::from(record)
        })
    }

    /// Every archetype with its effective templates
    pub async fn templates(&self) -> CoreResult<Vec<TemplateView>> {
        let mut views = Vec::with_capacity(StackKind::ALL.len());
        for kind in StackKind::ALL {
            views.push(self.template(kind).await?);
        }
        Ok(views)
    }

    /// Templates used for `kind`: the override directory wins over the built-in text
    pub async fn template(&self, kind: StackKind) -> CoreResult<TemplateView> {
        let TemplateOverrides { manifest, env } =
            self.ctx.store.load_template_overrides(kind).await?;
        let arch = template::archetype(kind);
        let pick = |custom: Option<String>, builtin: &str| match custom {
            Some(text) => (TemplateSource::Override, text),
            None => (TemplateSource::Builtin, builtin.to_string()),
        };
        let (manifest_source, manifest) = pick(manifest, arch.manifest_template);
        let (env_source, env) = pick(env, arch.env_template);

        Ok(TemplateView {
            kind,
            manifest_source,
            env_source,
            volume_dirs: arch.volume_dirs,
            fixed_image: arch.fixed_image,
            fixed_port: arch.fixed_port,
            manifest,
            env,
        })
    }

    /// Default domain plus every stack domain, sorted and deduplicated
    pub async fn domains(&self) -> CoreResult<Vec<String>> {
        let mut domains = BTreeSet::from([self.ctx.config.default_domain.clone()]);
        for name in self.ctx.store.list_names().await? {
            match self.ctx.store.read(&name).await {
                Ok(record) => domains.extend(record.domain),
                Err(e) => log::warn!("Skipping stack {name}: {e}"),
            }
        }
        Ok(domains.into_iter().collect())
    }
}
