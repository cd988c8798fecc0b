//! DNS API token discovery
//!
//! Sources are tried in the order of [`DISCOVERY_CHAIN`]; the first non-empty value wins. Nothing
//! here talks to the network, so a missing token is reported before any provider call.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::utils::env_file::parse_env;

/// Primary environment variable for the token
pub const PRIMARY_TOKEN_VAR: &str = "CF_API_TOKEN";
/// Older names still honored, in lookup order
pub const LEGACY_TOKEN_VARS: [&str; 2] = ["CF_DNS_API_TOKEN", "CLOUDFLARE_DNS_API_TOKEN"];
/// Reverse-proxy environment file, relative to the base directory
pub const FALLBACK_ENV_FILE: &str = "traefik/.env";

/// One step of the discovery chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStage {
    /// Token passed in by the caller or set in the configuration
    Explicit,
    /// Process environment variable
    Env(&'static str),
    /// Key in `{base}/traefik/.env`
    FallbackFile(&'static str),
}

pub const DISCOVERY_CHAIN: [TokenStage; 6] = [
    TokenStage::Explicit,
    TokenStage::Env(PRIMARY_TOKEN_VAR),
    TokenStage::Env(LEGACY_TOKEN_VARS[0]),
    TokenStage::Env(LEGACY_TOKEN_VARS[1]),
    TokenStage::FallbackFile("CF_API_TOKEN"),
    TokenStage::FallbackFile("CF_DNS_API_TOKEN"),
];

/// A token and where it was found
#[derive(Clone, Serialize)]
pub struct DiscoveredToken {
    #[serde(skip)]
    pub token: String,
    pub source: String,
}

impl std::fmt::Debug for DiscoveredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredToken")
            .field("token", &"***")
            .field("source", &self.source)
            .finish()
    }
}

/// Walk [`DISCOVERY_CHAIN`] with `env` as the environment lookup.
///
/// The fallback file is read at most once, and only if every earlier stage came up empty.
pub async fn discover_token<F>(
    explicit: Option<&str>,
    base_dir: &Path,
    env: F,
) -> CoreResult<DiscoveredToken>
where
    F: Fn(&str) -> Option<String>,
{
    let fallback_path = base_dir.join(FALLBACK_ENV_FILE);
    let mut fallback: Option<BTreeMap<String, String>> = None;

    for stage in DISCOVERY_CHAIN {
        let (value, source) = match stage {
            TokenStage::Explicit => (explicit.map(str::to_string), "explicit".to_string()),
            TokenStage::Env(var) => (env(var), format!("env:{var}")),
            TokenStage::FallbackFile(key) => {
                if fallback.is_none() {
                    fallback = Some(read_fallback(&fallback_path).await);
                }
                (
                    fallback.as_ref().and_then(|vars| vars.get(key).cloned()),
                    format!("file:{}:{key}", fallback_path.display()),
                )
            }
        };

        if let Some(token) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            log::debug!("DNS API token found via {source}");
            return Ok(DiscoveredToken { token, source });
        }
    }

    Err(CoreError::ConfigurationError(format!(
        "no DNS API token found: set STACKWIZ_DNS_API_TOKEN, {PRIMARY_TOKEN_VAR}, {} or add \
         CF_DNS_API_TOKEN to {}",
        LEGACY_TOKEN_VARS.join(", "),
        fallback_path.display()
    )))
}

/// Process-environment variant of [`discover_token`]
pub async fn discover_token_from_env(
    explicit: Option<&str>,
    base_dir: &Path,
) -> CoreResult<DiscoveredToken> {
    discover_token(explicit, base_dir, |key| std::env::var(key).ok()).await
}

async fn read_fallback(path: &Path) -> BTreeMap<String, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_env(&content),
        Err(e) => {
            log::debug!("Token fallback file {} unavailable: {e}", path.display());
            BTreeMap::new()
        }
    }
}
