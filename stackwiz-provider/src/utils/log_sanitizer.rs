//! Log sanitization utilities
//!
//! Response bodies and API tokens pass through here before they reach a log line.

/// Maximum number of bytes of a payload included in log output.
const TRUNCATE_LIMIT: usize = 256;

/// Number of characters kept at each end of a masked secret.
const MASK_VISIBLE: usize = 4;

/// Truncate a payload for logging.
///
/// Payloads within the limit are returned unchanged; longer ones are cut on a character
/// boundary and suffixed with the total length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        return s.to_string();
    }

    let cut = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= TRUNCATE_LIMIT)
        .last()
        .unwrap_or(0);

    format!("{}... [truncated, total {} bytes]", &s[..cut], s.len())
}

/// Mask a secret so only its first and last few characters remain visible.
///
/// Secrets too short to keep anything meaningful hidden are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= MASK_VISIBLE * 3 {
        return "***".to_string();
    }

    let head: String = chars[..MASK_VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - MASK_VISIBLE..].iter().collect();
    format!("{head}***{tail}")
}
