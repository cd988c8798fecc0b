//! Utility functions

pub mod env_file;
