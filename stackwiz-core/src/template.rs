//! Manifest and environment file rendering
//!
//! Rendering is a pure function of the validated stack and the optional override templates:
//! identical input always yields byte-identical output. Every `__TOKEN__` in a template must be
//! one of [`PLACEHOLDER_TOKENS`]; anything else fails rendering instead of leaking a literal
//! token into the manifest.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{CoreError, CoreResult};
use crate::types::{StackKind, ValidatedStack};

pub const PLACEHOLDER_TOKENS: [&str; 8] = [
    "__APP_NAME__",
    "__APP_DOMAIN__",
    "__APP_IMAGE__",
    "__APP_PORT__",
    "__TRAEFIK_NETWORK__",
    "__TRAEFIK_ENTRYPOINT__",
    "__TRAEFIK_CERTRESOLVER__",
    "__SERVICE_NAME__",
];

pub const CUSTOM_ENV_HEADER: &str = "# Custom environment variables";

static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"__[A-Z][A-Z0-9_]*?__"));

/// Per-kind template set and fixed parameters
#[derive(Debug)]
pub struct Archetype {
    pub manifest_template: &'static str,
    pub env_template: &'static str,
    /// Data-bearing directories created beside the manifest
    pub volume_dirs: &'static [&'static str],
    pub fixed_image: Option<&'static str>,
    pub fixed_port: Option<u16>,
}

static GENERIC: Archetype = Archetype {
    manifest_template: GENERIC_MANIFEST,
    env_template: GENERIC_ENV,
    volume_dirs: &["data", "config"],
    fixed_image: None,
    fixed_port: None,
};

static POCKETBASE: Archetype = Archetype {
    manifest_template: POCKETBASE_MANIFEST,
    env_template: POCKETBASE_ENV,
    volume_dirs: &["pb_data", "pb_public", "pb_migrations", "pb_hooks"],
    fixed_image: Some("ghcr.io/muchobien/pocketbase:latest"),
    fixed_port: Some(8090),
};

#[must_use]
pub fn archetype(kind: StackKind) -> &'static Archetype {
    match kind {
        StackKind::Generic => &GENERIC,
        StackKind::Pocketbase => &POCKETBASE,
    }
}

/// Replacement templates read from the templates directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateOverrides {
    pub manifest: Option<String>,
    pub env: Option<String>,
}

/// Rendered file contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStack {
    pub manifest: String,
    pub env: String,
}

/// Render the manifest and environment file for a validated stack.
pub fn render(stack: &ValidatedStack, overrides: &TemplateOverrides) -> CoreResult<RenderedStack> {
    let arch = archetype(stack.kind);
    let values = placeholder_values(stack);

    let manifest_template = overrides.manifest.as_deref().unwrap_or(arch.manifest_template);
    let env_template = overrides.env.as_deref().unwrap_or(arch.env_template);

    let manifest = substitute(manifest_template, &values, stack.kind, "manifest")?;
    let mut env = substitute(env_template, &values, stack.kind, "env")?;

    if !env.is_empty() && !env.ends_with('\n') {
        env.push('\n');
    }
    env.push_str("\n# StackWiz metadata\n");
    env.push_str("STACKWIZ_GENERATED=1\n");
    env.push_str(&format!("STACKWIZ_STACK_TYPE={}\n", stack.kind));

    if !stack.environment.is_empty() {
        env.push('\n');
        env.push_str(CUSTOM_ENV_HEADER);
        env.push('\n');
        for (key, value) in &stack.environment {
            env.push_str(&format!("{key}={value}\n"));
        }
    }

    Ok(RenderedStack { manifest, env })
}

fn placeholder_values(stack: &ValidatedStack) -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        ("__APP_NAME__", stack.name.clone()),
        ("__APP_DOMAIN__", stack.domain.clone()),
        ("__APP_IMAGE__", stack.image.clone()),
        ("__APP_PORT__", stack.port.to_string()),
        ("__TRAEFIK_NETWORK__", stack.network.clone()),
        ("__TRAEFIK_ENTRYPOINT__", stack.entrypoint.clone()),
        ("__TRAEFIK_CERTRESOLVER__", stack.certresolver.clone()),
        ("__SERVICE_NAME__", stack.name.clone()),
    ])
}

fn placeholder_pattern() -> CoreResult<&'static Regex> {
    PLACEHOLDER
        .as_ref()
        .map_err(|e| CoreError::TemplateError(format!("invalid placeholder pattern: {e}")))
}

fn substitute(
    template: &str,
    values: &BTreeMap<&'static str, String>,
    kind: StackKind,
    which: &str,
) -> CoreResult<String> {
    let pattern = placeholder_pattern()?;

    let unknown: Vec<&str> = pattern
        .find_iter(template)
        .map(|m| m.as_str())
        .filter(|token| !values.contains_key(*token))
        .collect();
    if !unknown.is_empty() {
        return Err(CoreError::TemplateError(format!(
            "unknown placeholder(s) {} in {kind} {which} template",
            unknown.join(", ")
        )));
    }

    // Single pass: values are inserted verbatim and never rescanned
    Ok(pattern
        .replace_all(template, |caps: &Captures<'_>| {
            values.get(&caps[0]).cloned().unwrap_or_default()
        })
        .into_owned())
}

const GENERIC_MANIFEST: &str = r#"services:
  __SERVICE_NAME__:
    image: __APP_IMAGE__
    container_name: __APP_NAME__
    restart: unless-stopped
    env_file:
      - ./.env
    volumes:
      - ./data:/data
      - ./config:/config
    networks:
      - __TRAEFIK_NETWORK__
    labels:
      - "traefik.enable=true"
      - "traefik.docker.network=__TRAEFIK_NETWORK__"
      - "traefik.http.routers.__APP_NAME__.rule=Host(`__APP_DOMAIN__`)"
      - "traefik.http.routers.__APP_NAME__.entrypoints=__TRAEFIK_ENTRYPOINT__"
      - "traefik.http.routers.__APP_NAME__.tls=true"
      - "traefik.http.routers.__APP_NAME__.tls.certresolver=__TRAEFIK_CERTRESOLVER__"
      - "traefik.http.services.__APP_NAME__.loadbalancer.server.port=__APP_PORT__"

networks:
  __TRAEFIK_NETWORK__:
    external: true
"#;

const GENERIC_ENV: &str = "# Generated by StackWiz
APP_NAME=__APP_NAME__
APP_DOMAIN=__APP_DOMAIN__
APP_IMAGE=__APP_IMAGE__
APP_PORT=__APP_PORT__
TRAEFIK_NETWORK=__TRAEFIK_NETWORK__
";

const POCKETBASE_MANIFEST: &str = r#"services:
  __SERVICE_NAME__:
    image: __APP_IMAGE__
    container_name: __APP_NAME__
    restart: unless-stopped
    command: ["--encryptionEnv", "PB_ENCRYPTION_KEY"]
    env_file:
      - ./.env
    volumes:
      - ./pb_data:/pb_data
      - ./pb_public:/pb_public
      - ./pb_migrations:/pb_migrations
      - ./pb_hooks:/pb_hooks
    healthcheck:
      test: ["CMD", "wget", "--no-verbose", "--tries=1", "--spider", "http://localhost:__APP_PORT__/api/health"]
      interval: 30s
      timeout: 5s
      retries: 3
      start_period: 10s
    networks:
      - __TRAEFIK_NETWORK__
    labels:
      - "traefik.enable=true"
      - "traefik.docker.network=__TRAEFIK_NETWORK__"
      - "traefik.http.routers.__APP_NAME__.rule=Host(`__APP_DOMAIN__`)"
      - "traefik.http.routers.__APP_NAME__.entrypoints=__TRAEFIK_ENTRYPOINT__"
      - "traefik.http.routers.__APP_NAME__.tls=true"
      - "traefik.http.routers.__APP_NAME__.tls.certresolver=__TRAEFIK_CERTRESOLVER__"
      - "traefik.http.services.__APP_NAME__.loadbalancer.server.port=__APP_PORT__"

networks:
  __TRAEFIK_NETWORK__:
    external: true
"#;

const POCKETBASE_ENV: &str = "# PocketBase stack generated by StackWiz
APP_NAME=__APP_NAME__
APP_DOMAIN=__APP_DOMAIN__
APP_IMAGE=__APP_IMAGE__
APP_PORT=__APP_PORT__
PB_ADMIN_URL=https://__APP_DOMAIN__/_/
PB_API_URL=https://__APP_DOMAIN__/api/
";
