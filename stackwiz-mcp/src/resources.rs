//! Resource URIs served over MCP `resources/*`.
//!
//! - `stack://list`, `stack://{name}/compose`, `stack://{name}/env`, `stack://{name}/status`
//! - `template://list`, `template://{type}`
//! - `infra://domains`

use std::fmt;
use std::str::FromStr;

use stackwiz_core::types::StackKind;

pub const JSON_MIME: &str = "application/json";
pub const YAML_MIME: &str = "application/yaml";

/// A parsed resource URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    StackList,
    StackCompose(String),
    StackEnv(String),
    StackStatus(String),
    TemplateList,
    Template(StackKind),
    Domains,
}

impl ResourceUri {
    /// Per-stack resources, in listing order
    pub fn for_stack(name: &str) -> [Self; 3] {
        [
            Self::StackCompose(name.to_string()),
            Self::StackEnv(name.to_string()),
            Self::StackStatus(name.to_string()),
        ]
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::StackCompose(_) => YAML_MIME,
            _ => JSON_MIME,
        }
    }

    /// Short resource name shown in listings
    pub fn title(&self) -> String {
        match self {
            Self::StackList => "stacks".to_string(),
            Self::StackCompose(name) => format!("{name} compose file"),
            Self::StackEnv(name) => format!("{name} environment"),
            Self::StackStatus(name) => format!("{name} status"),
            Self::TemplateList => "templates".to_string(),
            Self::Template(kind) => format!("{kind} template"),
            Self::Domains => "domains".to_string(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::StackList => "All user stacks with metadata and runtime status",
            Self::StackCompose(_) => "Stored docker-compose manifest",
            Self::StackEnv(_) => "Environment file entries; secret values are masked",
            Self::StackStatus(_) => "Stack metadata with live runtime status",
            Self::TemplateList => "Stack archetypes and where their templates come from",
            Self::Template(_) => "Effective manifest and environment templates for an archetype",
            Self::Domains => "Default domain and every domain served by a stack",
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackList => f.write_str("stack://list"),
            Self::StackCompose(name) => write!(f, "stack://{name}/compose"),
            Self::StackEnv(name) => write!(f, "stack://{name}/env"),
            Self::StackStatus(name) => write!(f, "stack://{name}/status"),
            Self::TemplateList => f.write_str("template://list"),
            Self::Template(kind) => write!(f, "template://{kind}"),
            Self::Domains => f.write_str("infra://domains"),
        }
    }
}

impl FromStr for ResourceUri {
    type Err = String;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let unknown = || format!("unknown resource: {uri}");
        match uri {
            "stack://list" => return Ok(Self::StackList),
            "template://list" => return Ok(Self::TemplateList),
            "infra://domains" => return Ok(Self::Domains),
            _ => {}
        }
        if let Some(kind) = uri.strip_prefix("template://") {
            return kind.parse().map(Self::Template).map_err(|_| unknown());
        }
        let (name, view) = uri
            .strip_prefix("stack://")
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(unknown)?;
        if name.is_empty() {
            return Err(unknown());
        }
        let name = name.to_string();
        match view {
            "compose" => Ok(Self::StackCompose(name)),
            "env" => Ok(Self::StackEnv(name)),
            "status" => Ok(Self::StackStatus(name)),
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_form() {
        let cases = [
            ("stack://list", ResourceUri::StackList),
            ("stack://web/compose", ResourceUri::StackCompose("web".into())),
            ("stack://web/env", ResourceUri::StackEnv("web".into())),
            ("stack://web/status", ResourceUri::StackStatus("web".into())),
            ("template://list", ResourceUri::TemplateList),
            ("template://pocketbase", ResourceUri::Template(StackKind::Pocketbase)),
            ("infra://domains", ResourceUri::Domains),
        ];
        for (uri, expected) in cases {
            let parsed: ResourceUri = uri.parse().unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.to_string(), uri);
        }
    }

    #[test]
    fn rejects_unknown_uris() {
        for uri in [
            "stack://web",
            "stack:///compose",
            "stack://web/logs",
            "template://supabase",
            "infra://ports",
            "file:///etc/passwd",
        ] {
            assert!(uri.parse::<ResourceUri>().is_err(), "{uri} accepted");
        }
    }

    #[test]
    fn compose_is_yaml_everything_else_json() {
        assert_eq!(ResourceUri::StackCompose("a".into()).mime_type(), YAML_MIME);
        assert_eq!(ResourceUri::StackEnv("a".into()).mime_type(), JSON_MIME);
    }
}
