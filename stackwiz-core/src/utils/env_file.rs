//! `.env` file parsing

use std::collections::BTreeMap;

/// Parse `KEY=value` lines, skipping blanks and `#` comments.
///
/// An optional `export ` prefix is accepted and one layer of matching single or double quotes is
/// stripped from the value. Later keys override earlier ones.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
