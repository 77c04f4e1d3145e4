//! Resolution pair used for frames and device buffers.
//!
//! A [`Size`] is a plain `(width, height)` pair in pixels. It describes
//! either the input or the output side of an upscaling pass.
//!
//! # Usage
//!
//! ```rust
//! use vsr_core::Size;
//!
//! let hd: Size = "1920x1080".parse().unwrap();
//! assert_eq!(hd, Size::new(1920, 1080));
//! assert!(hd.is_width_dominant());
//! assert_eq!(hd.area(), 2_073_600);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Width and height of an image in pixels.
///
/// # Invariants
///
/// Sizes produced by the negotiator are always strictly positive. Sizes
/// coming from the caller (frame dimensions) may be anything, including
/// zero; [`Size::try_new`] rejects those when validation is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Creates a size without validation.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Creates a size, rejecting zero dimensions.
    pub fn try_new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Number of pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` when width is strictly the larger axis.
    ///
    /// Square sizes are height-dominant.
    #[inline]
    pub const fn is_width_dominant(&self) -> bool {
        self.width > self.height
    }

    /// Clamps each axis independently into `[min, max]`.
    ///
    /// ```rust
    /// use vsr_core::Size;
    ///
    /// let s = Size::new(100, 2000).clamp(Size::new(160, 90), Size::new(1920, 1080));
    /// assert_eq!(s, Size::new(160, 1080));
    /// ```
    #[inline]
    pub fn clamp(&self, min: Size, max: Size) -> Size {
        Size::new(
            self.width.clamp(min.width, max.width),
            self.height.clamp(min.height, max.height),
        )
    }

    /// Scales both axes by `factor`, rounding half away from zero.
    ///
    /// ```rust
    /// use vsr_core::Size;
    ///
    /// assert_eq!(Size::new(161, 90).scaled(1.5), Size::new(242, 135));
    /// ```
    #[inline]
    pub fn scaled(&self, factor: f32) -> Size {
        Size::new(
            (self.width as f32 * factor).round() as u32,
            (self.height as f32 * factor).round() as u32,
        )
    }

    /// Returns the pair as a tuple.
    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl From<Size> for (u32, u32) {
    fn from(size: Size) -> Self {
        size.as_tuple()
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || Error::ParseSize { input: s.to_string() };
        let (w, h) = s
            .trim()
            .split_once(&['x', 'X', ':'][..])
            .ok_or_else(parse_err)?;
        let width = w.trim().parse().map_err(|_| parse_err())?;
        let height = h.trim().parse().map_err(|_| parse_err())?;
        Ok(Self::new(width, height))
    }
}
