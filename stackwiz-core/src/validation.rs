//! Stack name and configuration validation
//!
//! Everything here is pure: no filesystem, process or network access. Conflict checks against
//! existing stacks live in the stack service.

use std::collections::BTreeMap;

use crate::config::StackwizConfig;
use crate::store::SYSTEM_STACKS;
use crate::template::archetype;
use crate::types::{FieldError, StackSpec, ValidatedStack, ValidationReport};

pub const MAX_NAME_LEN: usize = 63;

/// Ports commonly claimed by host services
const WELL_KNOWN_PORTS: [(u16, &str); 8] = [
    (22, "SSH"),
    (80, "HTTP"),
    (443, "HTTPS"),
    (3306, "MySQL"),
    (5432, "PostgreSQL"),
    (6379, "Redis"),
    (27017, "MongoDB"),
    (9090, "Prometheus"),
];

/// Validate and normalize a stack specification.
pub fn validate(
    spec: &StackSpec,
    config: &StackwizConfig,
) -> Result<ValidatedStack, ValidationReport> {
    let report = check(spec, config);
    match report.normalized.clone() {
        Some(stack) if report.valid => Ok(stack),
        _ => Err(report),
    }
}

/// Full validation report: per-field errors, warnings, suggestions and the normalized stack
/// when valid.
pub fn check(spec: &StackSpec, config: &StackwizConfig) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut suggestions = BTreeMap::new();

    let name = spec.name.as_str();
    if let Err(message) = validate_name(name) {
        errors.push(FieldError::new("name", message));
        if let Some(slug) = slugify(name).filter(|s| validate_name(s).is_ok()) {
            suggestions.insert("name".to_string(), slug);
        }
    }

    let domain = spec.domain.as_deref().map_or_else(
        || format!("{name}.{}", config.default_domain),
        |d| d.trim().trim_end_matches('.').to_ascii_lowercase(),
    );
    if let Err(message) = validate_domain(&domain) {
        errors.push(FieldError::new("domain", message));
    }

    let arch = archetype(spec.kind);
    let image = match (arch.fixed_image, spec.image.as_deref()) {
        (Some(fixed), supplied) => {
            if supplied.is_some_and(|s| s.trim() != fixed) {
                warnings.push(format!(
                    "image is fixed to {fixed} for {} stacks; the supplied image is ignored",
                    spec.kind
                ));
            }
            Some(fixed.to_string())
        }
        (None, Some(image)) => match validate_image(image) {
            Ok(()) => {
                if !has_explicit_tag(image.trim()) {
                    warnings.push(format!(
                        "image '{}' has no explicit tag; ':latest' will be pulled",
                        image.trim()
                    ));
                }
                Some(image.trim().to_string())
            }
            Err(message) => {
                errors.push(FieldError::new("image", message));
                None
            }
        },
        (None, None) => {
            errors.push(FieldError::new(
                "image",
                format!("required for {} stacks", spec.kind),
            ));
            None
        }
    };

    let port = match (arch.fixed_port, spec.port) {
        (Some(fixed), supplied) => {
            if supplied.is_some_and(|p| p != i64::from(fixed)) {
                warnings.push(format!(
                    "port is fixed to {fixed} for {} stacks; the supplied port is ignored",
                    spec.kind
                ));
            }
            Some(fixed)
        }
        (None, Some(port)) => match validate_port(port) {
            Ok(port) => {
                warnings.extend(port_warnings(port));
                Some(port)
            }
            Err(message) => {
                errors.push(FieldError::new("port", message));
                None
            }
        },
        (None, None) => {
            errors.push(FieldError::new(
                "port",
                format!("required for {} stacks", spec.kind),
            ));
            None
        }
    };

    for (key, value) in &spec.environment {
        if !is_valid_env_key(key) {
            errors.push(FieldError::new(
                format!("environment.{key}"),
                "not a valid environment variable name ([A-Za-z_][A-Za-z0-9_]*)",
            ));
        } else if value.contains(['\n', '\r']) {
            errors.push(FieldError::new(
                format!("environment.{key}"),
                "value must not contain line breaks",
            ));
        }
    }

    let network = routing_param(
        spec.network.as_deref(),
        &config.routing.network,
        "network",
        &mut errors,
    );
    let entrypoint = routing_param(
        spec.entrypoint.as_deref(),
        &config.routing.entrypoint,
        "entrypoint",
        &mut errors,
    );
    let certresolver = routing_param(
        spec.certresolver.as_deref(),
        &config.routing.certresolver,
        "certresolver",
        &mut errors,
    );

    let valid = errors.is_empty();
    let normalized = match (valid, image, port) {
        (true, Some(image), Some(port)) => Some(ValidatedStack {
            name: name.to_string(),
            kind: spec.kind,
            domain,
            image,
            port,
            environment: spec.environment.clone(),
            network,
            entrypoint,
            certresolver,
        }),
        _ => None,
    };

    ValidationReport {
        valid,
        errors,
        warnings,
        suggestions,
        normalized,
    }
}

/// Lowercase alphanumerics with interior hyphens, 1 to 63 characters.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("must be at most {MAX_NAME_LEN} characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err("may only contain lowercase letters, digits and hyphens".to_string());
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("must not start or end with a hyphen".to_string());
    }
    if SYSTEM_STACKS.contains(&name) {
        return Err(format!("'{name}' is reserved for an infrastructure stack"));
    }
    Ok(())
}

/// Fully-qualified hostname: no whitespace, at least one dot, no empty labels.
pub fn validate_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("must not be empty".to_string());
    }
    if domain.chars().any(char::is_whitespace) {
        return Err("must not contain whitespace".to_string());
    }
    if !domain.contains('.') {
        return Err("must be a fully-qualified hostname".to_string());
    }
    for label in domain.split('.') {
        if label.is_empty() {
            return Err("must not contain empty labels".to_string());
        }
        if label.len() > MAX_NAME_LEN {
            return Err(format!("label '{label}' exceeds {MAX_NAME_LEN} characters"));
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(format!("label '{label}' contains invalid characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label '{label}' must not start or end with a hyphen"));
        }
    }
    Ok(())
}

pub fn validate_port(port: i64) -> Result<u16, String> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| format!("{port} is outside 1-65535"))
}

fn validate_image(image: &str) -> Result<(), String> {
    let image = image.trim();
    if image.is_empty() {
        return Err("must not be empty".to_string());
    }
    if image.chars().any(char::is_whitespace) {
        return Err("must not contain whitespace".to_string());
    }
    Ok(())
}

fn has_explicit_tag(image: &str) -> bool {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    last_segment.contains(':') || image.contains('@')
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_env_key(key: &str) -> bool {
    let mut bytes = key.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn port_warnings(port: u16) -> Vec<String> {
    let mut warnings = Vec::new();
    if port < 1024 {
        warnings.push(format!("port {port} is a privileged port"));
    }
    if let Some((_, service)) = WELL_KNOWN_PORTS.iter().find(|(p, _)| *p == port) {
        warnings.push(format!("port {port} is commonly used by {service}"));
    }
    warnings
}

fn routing_param(
    supplied: Option<&str>,
    default: &str,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> String {
    let Some(value) = supplied.map(str::trim) else {
        return default.to_string();
    };
    let allowed = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-');
    if value.is_empty() || !value.bytes().all(allowed) {
        errors.push(FieldError::new(
            field,
            "may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    value.to_string()
}

/// Closest valid stack name, if any characters survive.
pub fn slugify(input: &str) -> Option<String> {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.truncate(MAX_NAME_LEN);
    let slug = slug.trim_matches('-').to_string();
    (!slug.is_empty()).then_some(slug)
}
