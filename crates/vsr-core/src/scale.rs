//! Scale factor search and resolution negotiation.
//!
//! Super-resolution kernels only support a fixed set of magnification
//! factors and cap the input resolution they accept, with tighter caps for
//! larger factors. This module maps an arbitrary `(frame size, requested
//! scale)` pair onto something the kernel can actually run:
//!
//! 1. The requested scale is clamped into `[1, 4]` and snapped to the
//!    nearest entry of [`SUPPORTED_SCALES`].
//! 2. The frame is fitted into scale-dependent bounds (see
//!    [`bounds_for_scale`]) along its dominant axis; the other axis follows
//!    the aspect ratio and is clamped on its own.
//! 3. The output size is the input size times the scale, rounded per axis.
//! 4. If rounding made either axis deviate from the scale, the next larger
//!    supported scale is tried.
//!
//! # Usage
//!
//! ```rust
//! use vsr_core::{negotiate, Size};
//!
//! let n = negotiate(Size::new(100, 50), 2.0);
//! assert_eq!(n.input, Size::new(160, 90));
//! assert_eq!(n.output, Size::new(320, 180));
//! assert_eq!(n.scale, 2.0);
//! ```
//!
//! # Aspect ratio at the extremes
//!
//! The two clamps are independent, so very wide or very tall frames lose
//! their exact aspect ratio once the minor axis hits its floor or ceiling.
//! That is the expected behavior of the clamp order.

use std::fmt;

use crate::error::{Error, Result};
use crate::size::Size;

/// Magnification factors supported by the kernel, strictly increasing.
pub const SUPPORTED_SCALES: [f32; 5] = [4.0 / 3.0, 1.5, 2.0, 3.0, 4.0];

/// Smallest accepted requested scale.
pub const MIN_SCALE: f32 = 1.0;

/// Largest accepted requested scale.
pub const MAX_SCALE: f32 = 4.0;

/// Lower resolution bound, independent of scale.
pub const MIN_INPUT: Size = Size::new(160, 90);

/// Relative tolerance for the per-axis scale check.
const UNIFORM_TOLERANCE: f32 = 1e-5;

/// Index into [`SUPPORTED_SCALES`] of the entry closest to `factor`.
///
/// Ties go to the smaller entry. NaN maps to index 0.
pub fn closest_scale_index(factor: f32) -> usize {
    let mut best = (0usize, f32::MAX);
    for (idx, &supported) in SUPPORTED_SCALES.iter().enumerate() {
        let delta = (supported - factor).abs();
        if delta < best.1 {
            best = (idx, delta);
        }
    }
    best.0
}

/// Supported scale closest to `factor` (no range clamping).
///
/// ```rust
/// use vsr_core::closest_scale;
///
/// assert_eq!(closest_scale(1.75), 1.5); // tie, smaller wins
/// assert_eq!(closest_scale(2.6), 3.0);
/// ```
pub fn closest_scale(factor: f32) -> f32 {
    SUPPORTED_SCALES[closest_scale_index(factor)]
}

/// Clamps `requested` into `[1, 4]` and snaps it to a supported scale.
///
/// ```rust
/// use vsr_core::snap_scale;
///
/// assert_eq!(snap_scale(0.5), 4.0 / 3.0);
/// assert_eq!(snap_scale(9.0), 4.0);
/// ```
pub fn snap_scale(requested: f32) -> f32 {
    closest_scale(requested.clamp(MIN_SCALE, MAX_SCALE))
}

/// Parses a user-supplied scale factor.
///
/// Accepts plain numbers (`"1.5"`) and ratios (`"4/3"`). The value is not
/// snapped; non-finite or non-positive values are rejected.
pub fn parse_scale(input: &str) -> Result<f32> {
    let err = || Error::InvalidScale(input.to_string());
    let input_trimmed = input.trim();
    let value = match input_trimmed.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.trim().parse().map_err(|_| err())?;
            let den: f32 = den.trim().parse().map_err(|_| err())?;
            num / den
        }
        None => input_trimmed.parse().map_err(|_| err())?,
    };
    if !value.is_finite() || value <= 0.0 {
        return Err(err());
    }
    Ok(value)
}

/// Inclusive resolution bounds for the kernel input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Floor.
    pub min: Size,
    /// Ceiling.
    pub max: Size,
}

/// Input bounds for a given scale.
///
/// | scale | ceiling |
/// |---|---|
/// | > 3 | 960x540 |
/// | > 2 | 1280x720 |
/// | otherwise | 1920x1080 |
///
/// The floor is always 160x90.
pub fn bounds_for_scale(scale: f32) -> Bounds {
    let max = if scale > 3.0 {
        Size::new(960, 540)
    } else if scale > 2.0 {
        Size::new(1280, 720)
    } else {
        Size::new(1920, 1080)
    };
    Bounds { min: MIN_INPUT, max }
}

/// Result of a negotiation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Negotiation {
    /// Kernel input resolution.
    pub input: Size,
    /// Kernel output resolution.
    pub output: Size,
    /// Accepted scale, a member of [`SUPPORTED_SCALES`].
    pub scale: f32,
    /// Snapped requested scale the search started from.
    pub requested: f32,
    /// Both axes scale by exactly `scale` (within tolerance).
    ///
    /// Only `false` when even the largest supported scale diverges, in which
    /// case the divergent sizes are returned as-is.
    pub uniform: bool,
}

impl Negotiation {
    /// Whether the accepted scale differs from the requested one.
    pub fn was_promoted(&self) -> bool {
        self.scale != self.requested
    }
}

impl fmt::Display for Negotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} @ {:.4}x", self.input, self.output, self.scale)
    }
}

/// Negotiates input/output sizes for `frame` at `scale`.
///
/// Pure function; see the module docs for the algorithm. The scale search
/// walks [`SUPPORTED_SCALES`] upward at most once.
pub fn negotiate(frame: Size, scale: f32) -> Negotiation {
    let requested = snap_scale(scale);
    let mut idx = closest_scale_index(requested);

    loop {
        let scale = SUPPORTED_SCALES[idx];
        let input = fit_input(frame, bounds_for_scale(scale));
        let output = input.scaled(scale);
        let uniform = is_uniform(input, output, scale);

        if uniform || idx + 1 >= SUPPORTED_SCALES.len() {
            return Negotiation {
                input,
                output,
                scale,
                requested,
                uniform,
            };
        }
        idx += 1;
    }
}

/// Fits `frame` into `bounds`, dominant axis first. Squares go by height.
fn fit_input(frame: Size, bounds: Bounds) -> Size {
    let Bounds { min, max } = bounds;
    let w = frame.width.max(1) as f64;
    let h = frame.height.max(1) as f64;

    if frame.is_width_dominant() {
        let width = frame.width.clamp(min.width, max.width);
        let height = clamp_rounded(width as f64 * (h / w), min.height, max.height);
        Size::new(width, height)
    } else {
        let height = frame.height.clamp(min.height, max.height);
        let width = clamp_rounded(height as f64 * (w / h), min.width, max.width);
        Size::new(width, height)
    }
}

#[inline]
fn clamp_rounded(value: f64, lo: u32, hi: u32) -> u32 {
    value.round().clamp(lo as f64, hi as f64) as u32
}

#[inline]
fn is_uniform(input: Size, output: Size, scale: f32) -> bool {
    let close = |out: u32, inp: u32| {
        let factor = out as f32 / inp as f32;
        (factor - scale).abs() <= UNIFORM_TOLERANCE * scale
    };
    close(output.width, input.width) && close(output.height, input.height)
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    frame: Size,
    scale: f32,
    negotiation: Negotiation,
}

/// Memoizing wrapper around [`negotiate`].
///
/// Holds the last `(frame size, snapped scale)` and its result; repeated
/// calls with the same key skip the search.
///
/// ```rust
/// use vsr_core::{ScaleNegotiator, Size};
///
/// let mut neg = ScaleNegotiator::new();
/// let a = neg.resolve(Size::new(1280, 720), 2.0);
/// let b = neg.resolve(Size::new(1280, 720), 2.1); // snaps to 2.0 as well
/// assert_eq!(a, b);
/// assert_eq!(neg.hits(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ScaleNegotiator {
    cache: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ScaleNegotiator {
    /// Creates a negotiator with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Negotiates sizes, reusing the previous result when nothing changed.
    pub fn resolve(&mut self, frame: Size, scale: f32) -> Negotiation {
        let scale = snap_scale(scale);
        if let Some(entry) = &self.cache {
            if entry.frame == frame && entry.scale == scale {
                self.hits += 1;
                return entry.negotiation;
            }
        }

        self.misses += 1;
        let negotiation = negotiate(frame, scale);
        self.cache = Some(CacheEntry {
            frame,
            scale,
            negotiation,
        });
        negotiation
    }

    /// Last negotiation, if any.
    pub fn last(&self) -> Option<&Negotiation> {
        self.cache.as_ref().map(|e| &e.negotiation)
    }

    /// Drops the cached result.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Number of calls answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of calls that ran the search.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}
