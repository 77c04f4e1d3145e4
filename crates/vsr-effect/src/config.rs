//! Effect configuration.
//!
//! # Environment Variables
//!
//! - `VSR_STRENGTH` - Initial strength (float, bucketed at 0.5)
//! - `VSR_SCALE` - Initial scale (`1.5` or `4/3`)
//! - `VSR_INITIAL_SIZE` - Frame size to allocate for before the first frame (`WxH`)

use std::env;
use std::str::FromStr;

use tracing::warn;
use vsr_core::{Size, parse_scale};

/// Initial effect parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectConfig {
    /// Raw strength; `>= 0.5` enables enhancement.
    pub strength: f32,
    /// Requested scale, snapped on use.
    pub scale: f32,
    /// Frame size buffers are allocated for at construction.
    pub initial_size: Size,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            strength: 1.0,
            scale: 1.5,
            initial_size: Size::new(160, 90),
        }
    }
}

impl EffectConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(strength) = env_parsed::<f32>("VSR_STRENGTH") {
            config.strength = strength;
        }
        if let Ok(raw) = env::var("VSR_SCALE") {
            match parse_scale(&raw) {
                Ok(scale) => config.scale = scale,
                Err(e) => warn!(var = "VSR_SCALE", error = %e, "ignoring override"),
            }
        }
        if let Some(size) = env_parsed::<Size>("VSR_INITIAL_SIZE") {
            config.initial_size = size;
        }
        config
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_initial_size(mut self, size: Size) -> Self {
        self.initial_size = size;
        self
    }
}

fn env_parsed<T: FromStr>(var: &str) -> Option<T> {
    let raw = env::var(var).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!(var, value = %raw, "ignoring unparsable override");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EffectConfig::default();
        assert_eq!(config.strength, 1.0);
        assert_eq!(config.scale, 1.5);
        assert_eq!(config.initial_size, Size::new(160, 90));
    }

    #[test]
    fn test_builders() {
        let config = EffectConfig::default()
            .with_strength(0.0)
            .with_scale(3.0)
            .with_initial_size(Size::new(640, 360));
        assert_eq!(config.strength, 0.0);
        assert_eq!(config.scale, 3.0);
        assert_eq!(config.initial_size, Size::new(640, 360));
    }
}
