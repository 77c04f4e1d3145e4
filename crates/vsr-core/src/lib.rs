//! # vsr-core
//!
//! Core types for real-time video super-resolution.
//!
//! This crate provides the pure, device-independent pieces used throughout
//! the vsr-rs workspace:
//!
//! - [`Size`] - Resolution pair (width, height)
//! - [`PixelFormat`] - Pixel order, component type, layout and residency of a buffer
//! - [`negotiate`], [`ScaleNegotiator`] - Scale factor search and resolution clamping
//! - [`Strength`] - Two-state strength bucket
//!
//! ## Crate Structure
//!
//! ```text
//! vsr-core (this crate)
//!    ^
//!    |
//!    +-- vsr-compute (accelerator traits, CPU reference backend)
//!    +-- vsr-effect (buffer pipeline, frame orchestration)
//!    +-- vsr-cli (inspection and benchmarking tool)
//! ```
//!
//! Everything here is side-effect free; no device memory is touched.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod format;
pub mod scale;
pub mod size;
pub mod strength;

// Re-exports for convenience
pub use error::*;
pub use format::*;
pub use scale::{
    Bounds, Negotiation, ScaleNegotiator, SUPPORTED_SCALES, bounds_for_scale, closest_scale,
    closest_scale_index, negotiate, parse_scale, snap_scale,
};
pub use size::*;
pub use strength::*;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use vsr_core::prelude::*;
///
/// let n = negotiate(Size::new(1920, 1080), 1.5);
/// assert_eq!(n.output, Size::new(2880, 1620));
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::format::{ComponentLayout, ComponentType, MemoryLocation, PixelFormat, PixelOrder};
    pub use crate::scale::{Negotiation, ScaleNegotiator, SUPPORTED_SCALES, negotiate, snap_scale};
    pub use crate::size::Size;
    pub use crate::strength::Strength;
}
