//! Process configuration sourced from the environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use stackwiz_provider::log_sanitizer::mask_secret;

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_BASE_DIR: &str = "/srv/dockerdata";
pub const DEFAULT_DOMAIN: &str = "rbnk.uk";
pub const DEFAULT_GROUP: &str = "docker";
pub const DEFAULT_NETWORK: &str = "traefik_proxy";
pub const DEFAULT_ENTRYPOINT: &str = "websecure";
pub const DEFAULT_CERTRESOLVER: &str = "cf";
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";
pub const DEFAULT_COMPOSE_COMMAND: &str = "docker compose";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;
/// Cloudflare treats a TTL of 1 as "automatic"
pub const DEFAULT_DNS_TTL: u32 = 1;

/// Reverse-proxy routing defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDefaults {
    pub network: String,
    pub entrypoint: String,
    pub certresolver: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DnsConfig {
    /// Explicit token, first stage of credential discovery
    pub api_token: Option<String>,
    /// Registered apex; when unset zones are found by walking domain suffixes
    pub zone: Option<String>,
    pub default_ttl: u32,
    pub default_proxied: bool,
}

impl std::fmt::Debug for DnsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("zone", &self.zone)
            .field("default_ttl", &self.default_ttl)
            .field("default_proxied", &self.default_proxied)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Program and leading arguments, e.g. `["docker", "compose"]`
    pub compose_command: Vec<String>,
    pub docker_socket: PathBuf,
    pub command_timeout: Duration,
}

/// Immutable process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackwizConfig {
    pub base_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub default_user: Option<String>,
    pub default_group: Option<String>,
    /// Apply chown after materializing; off when running inside a container
    pub manage_ownership: bool,
    pub default_domain: String,
    pub routing: RoutingDefaults,
    pub dns: DnsConfig,
    pub runtime: RuntimeConfig,
    /// Used when a create request leaves `autoStart` unset
    pub auto_start: bool,
}

impl StackwizConfig {
    /// Defaults rooted at `base_dir`, with no environment involved
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            templates_dir: base_dir.join("_templates"),
            base_dir,
            default_user: None,
            default_group: None,
            manage_ownership: false,
            default_domain: DEFAULT_DOMAIN.to_string(),
            routing: RoutingDefaults {
                network: DEFAULT_NETWORK.to_string(),
                entrypoint: DEFAULT_ENTRYPOINT.to_string(),
                certresolver: DEFAULT_CERTRESOLVER.to_string(),
            },
            dns: DnsConfig {
                api_token: None,
                zone: None,
                default_ttl: DEFAULT_DNS_TTL,
                default_proxied: true,
            },
            runtime: RuntimeConfig {
                compose_command: split_command(DEFAULT_COMPOSE_COMMAND),
                docker_socket: PathBuf::from(DEFAULT_DOCKER_SOCKET),
                command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            },
            auto_start: false,
        }
    }

    /// Load from the process environment
    pub fn from_env() -> CoreResult<Self> {
        let in_container = Path::new("/.dockerenv").exists();
        Self::from_lookup(|key| std::env::var(key).ok(), in_container)
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, in_container: bool) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_dir = get("STACKWIZ_BASE_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_BASE_DIR), PathBuf::from);
        let mut config = Self::with_base_dir(base_dir);

        if let Some(dir) = get("STACKWIZ_TEMPLATES_DIR") {
            config.templates_dir = PathBuf::from(dir);
        }
        config.default_user = get("STACKWIZ_DEFAULT_USER").or_else(|| get("USER"));
        config.default_group =
            Some(get("STACKWIZ_DEFAULT_GROUP").unwrap_or_else(|| DEFAULT_GROUP.to_string()));
        config.manage_ownership = parse_bool(
            "STACKWIZ_MANAGE_OWNERSHIP",
            get("STACKWIZ_MANAGE_OWNERSHIP"),
            true,
        )? && !in_container;

        if let Some(domain) = get("STACKWIZ_DEFAULT_DOMAIN") {
            config.default_domain = domain.to_ascii_lowercase();
        }
        if let Some(network) = get("STACKWIZ_TRAEFIK_NETWORK") {
            config.routing.network = network;
        }
        if let Some(entrypoint) = get("STACKWIZ_TRAEFIK_ENTRYPOINT") {
            config.routing.entrypoint = entrypoint;
        }
        if let Some(resolver) = get("STACKWIZ_TRAEFIK_CERTRESOLVER") {
            config.routing.certresolver = resolver;
        }

        config.dns.api_token = get("STACKWIZ_DNS_API_TOKEN");
        config.dns.zone = get("STACKWIZ_DNS_ZONE")
            .map(|z| z.trim_end_matches('.').to_ascii_lowercase());
        config.dns.default_ttl =
            parse_number("STACKWIZ_DNS_TTL", get("STACKWIZ_DNS_TTL"), DEFAULT_DNS_TTL)?;
        config.dns.default_proxied =
            parse_bool("STACKWIZ_DNS_PROXIED", get("STACKWIZ_DNS_PROXIED"), true)?;

        if let Some(socket) = get("STACKWIZ_DOCKER_SOCKET") {
            config.runtime.docker_socket = PathBuf::from(socket);
        }
        if let Some(command) = get("STACKWIZ_COMPOSE_COMMAND") {
            config.runtime.compose_command = split_command(&command);
        }
        let timeout = parse_number(
            "STACKWIZ_COMMAND_TIMEOUT",
            get("STACKWIZ_COMMAND_TIMEOUT"),
            DEFAULT_COMMAND_TIMEOUT_SECS,
        )?;
        if timeout == 0 {
            return Err(CoreError::ConfigurationError(
                "STACKWIZ_COMMAND_TIMEOUT must be greater than zero".to_string(),
            ));
        }
        config.runtime.command_timeout = Duration::from_secs(timeout);

        config.auto_start = parse_bool("STACKWIZ_AUTO_START", get("STACKWIZ_AUTO_START"), false)?;

        Ok(config)
    }

    /// Diagnostic snapshot with the token masked
    #[must_use]
    pub fn masked(&self) -> serde_json::Value {
        serde_json::json!({
            "base_dir": self.base_dir,
            "templates_dir": self.templates_dir,
            "default_user": self.default_user,
            "default_group": self.default_group,
            "manage_ownership": self.manage_ownership,
            "default_domain": self.default_domain,
            "routing": self.routing,
            "dns": {
                "api_token": self.dns.api_token.as_deref().map(mask_secret),
                "zone": self.dns.zone,
                "default_ttl": self.dns.default_ttl,
                "default_proxied": self.dns.default_proxied,
            },
            "runtime": {
                "compose_command": self.runtime.compose_command.join(" "),
                "docker_socket": self.runtime.docker_socket,
                "command_timeout_secs": self.runtime.command_timeout.as_secs(),
            },
            "auto_start": self.auto_start,
        })
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> CoreResult<bool> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::ConfigurationError(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> CoreResult<T> {
    let Some(value) = value else {
        return Ok(default);
    };
    value.parse().map_err(|_| {
        CoreError::ConfigurationError(format!(
            "{key} must be a non-negative integer, got '{value}'"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], in_container: bool) -> CoreResult<StackwizConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StackwizConfig::from_lookup(|key| map.get(key).cloned(), in_container)
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[], false).unwrap();
        assert_eq!(config.base_dir, PathBuf::from(DEFAULT_BASE_DIR));
        assert_eq!(config.templates_dir, PathBuf::from("/srv/dockerdata/_templates"));
        assert_eq!(config.default_domain, "rbnk.uk");
        assert_eq!(config.default_group.as_deref(), Some("docker"));
        assert_eq!(config.routing.network, "traefik_proxy");
        assert_eq!(config.dns.default_ttl, 1);
        assert!(config.dns.default_proxied);
        assert_eq!(config.runtime.compose_command, vec!["docker", "compose"]);
        assert_eq!(config.runtime.command_timeout, Duration::from_secs(120));
        assert!(config.manage_ownership);
        assert!(!config.auto_start);
    }

    #[test]
    fn templates_dir_follows_base_dir() {
        let config = load(&[("STACKWIZ_BASE_DIR", "/data/stacks")], false).unwrap();
        assert_eq!(config.templates_dir, PathBuf::from("/data/stacks/_templates"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(
            &[
                ("STACKWIZ_DEFAULT_DOMAIN", "Example.COM"),
                ("STACKWIZ_DNS_ZONE", "example.com."),
                ("STACKWIZ_DNS_PROXIED", "no"),
                ("STACKWIZ_COMPOSE_COMMAND", "docker-compose"),
                ("STACKWIZ_COMMAND_TIMEOUT", "30"),
                ("STACKWIZ_AUTO_START", "true"),
                ("USER", "deploy"),
            ],
            false,
        )
        .unwrap();
        assert_eq!(config.default_domain, "example.com");
        assert_eq!(config.dns.zone.as_deref(), Some("example.com"));
        assert!(!config.dns.default_proxied);
        assert_eq!(config.runtime.compose_command, vec!["docker-compose"]);
        assert_eq!(config.runtime.command_timeout, Duration::from_secs(30));
        assert!(config.auto_start);
        assert_eq!(config.default_user.as_deref(), Some("deploy"));
    }

    #[test]
    fn ownership_disabled_inside_container() {
        let config = load(&[("STACKWIZ_MANAGE_OWNERSHIP", "true")], true).unwrap();
        assert!(!config.manage_ownership);
    }

    // ---- Malformed values ----

    #[test]
    fn malformed_timeout_is_configuration_error() {
        let err = load(&[("STACKWIZ_COMMAND_TIMEOUT", "soon")], false).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConfigurationError(msg) if msg.contains("STACKWIZ_COMMAND_TIMEOUT")
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = load(&[("STACKWIZ_COMMAND_TIMEOUT", "0")], false).unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
    }

    #[test]
    fn malformed_flag_is_configuration_error() {
        let err = load(&[("STACKWIZ_AUTO_START", "maybe")], false).unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
    }

    #[test]
    fn masked_snapshot_hides_token() {
        let config = load(&[("STACKWIZ_DNS_API_TOKEN", "abcd1234efgh5678ijkl")], false).unwrap();
        let snapshot = config.masked().to_string();
        assert!(!snapshot.contains("abcd1234efgh5678ijkl"));
        assert!(format!("{:?}", config.dns).contains("***"));
    }
}
