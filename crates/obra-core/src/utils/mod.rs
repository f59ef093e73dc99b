//! Utility functions for terminal-facing formatting.

pub mod format;

pub use format::{format_remaining, mask_token};
