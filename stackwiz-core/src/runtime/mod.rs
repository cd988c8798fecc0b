//! Container runtime drivers

mod compose_cli;

pub use compose_cli::{derive_status, parse_ps_states, ComposeCli, FATAL_STDERR_PATTERNS};
