//! Error types for vsr-core operations.
//!
//! The negotiation functions themselves are infallible; errors only arise
//! when constructing or parsing values at the edges (CLI arguments,
//! environment overrides).
//!
//! # Usage
//!
//! ```rust
//! use vsr_core::{Error, Size};
//!
//! let err = Size::try_new(0, 1080).unwrap_err();
//! assert!(matches!(err, Error::InvalidDimensions { width: 0, height: 1080 }));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by vsr-core value constructors and parsers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A dimension is zero.
    ///
    /// Negotiated resolutions are always strictly positive, so a zero
    /// width or height can only come from caller input.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A size string could not be parsed.
    ///
    /// Accepted forms are `WIDTHxHEIGHT` and `WIDTH:HEIGHT`.
    #[error("invalid size '{input}': expected WIDTHxHEIGHT")]
    ParseSize {
        /// Offending input
        input: String,
    },

    /// A scale value is not a finite number.
    #[error("invalid scale factor: {0}")]
    InvalidScale(String),
}
