//! Effect strength bucket.
//!
//! The kernel exposes a single integer strength parameter with two useful
//! states. Callers set an arbitrary float; only crossing the `0.5`
//! threshold changes what the kernel sees, and therefore only such a
//! crossing requires reloading it.

use std::fmt;

/// Threshold at which the raw strength switches buckets.
pub const STRENGTH_THRESHOLD: f32 = 0.5;

/// Two-state strength derived from a raw float.
///
/// ```rust
/// use vsr_core::Strength;
///
/// assert_eq!(Strength::from_raw(0.9), Strength::from_raw(0.95));
/// assert_ne!(Strength::from_raw(0.49), Strength::from_raw(0.5));
/// assert_eq!(Strength::from_raw(f32::NAN), Strength::Off);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strength {
    /// Plain upscale.
    #[default]
    Off,
    /// Upscale with detail enhancement.
    On,
}

impl Strength {
    /// Buckets a raw strength: `>= 0.5` is [`Strength::On`].
    pub fn from_raw(raw: f32) -> Self {
        if raw >= STRENGTH_THRESHOLD {
            Self::On
        } else {
            Self::Off
        }
    }

    /// Integer value passed to the kernel.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// Bucket value as a float.
    #[inline]
    pub const fn value(self) -> f32 {
        self.as_u32() as f32
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets() {
        assert_eq!(Strength::from_raw(0.0).as_u32(), 0);
        assert_eq!(Strength::from_raw(0.5).as_u32(), 1);
        assert_eq!(Strength::from_raw(7.0), Strength::On);
        assert_eq!(Strength::from_raw(-1.0), Strength::Off);
        assert_eq!(Strength::On.value(), 1.0);
    }
}
