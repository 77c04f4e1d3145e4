//! CLI command implementations

pub mod negotiate;
pub mod run;
pub mod table;

use anyhow::{Context, Result};
use vsr_core::parse_scale;

/// Parses a scale argument, naming it in the error.
pub fn scale_arg(raw: &str) -> Result<f32> {
    parse_scale(raw).with_context(|| format!("Invalid scale: {raw}"))
}
