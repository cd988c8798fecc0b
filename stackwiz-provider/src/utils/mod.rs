//! Utility modules.

/// Log sanitization helpers keeping tokens and large payloads out of logs.
pub mod log_sanitizer;
