//! Accelerator abstraction for video super-resolution.
//!
//! Describes the device-side collaborators the upscaling effect talks to,
//! and ships a CPU (rayon) reference backend implementing all of them.
//!
//! # Architecture
//!
//! ```text
//! SuperResolution (vsr-effect)
//!     ├── Accelerator trait
//!     │       └── CpuAccelerator (rayon)
//!     ├── UpscaleKernel trait
//!     │       └── ReferenceKernel (bilinear + unsharp)
//!     └── DeviceScope (graphics + compute context guards)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vsr_compute::{Accelerator, CpuAccelerator, DeviceScope};
//! use vsr_core::PixelFormat;
//!
//! let accel = CpuAccelerator::new();
//! let _scope = DeviceScope::enter(&accel)?;
//! let src = accel.allocate_image(1920, 1080, PixelFormat::RGBA8_INTERLEAVED)?;
//! let mut dst = accel.allocate_image(1920, 1080, PixelFormat::BGR_F32_PLANAR)?;
//! let mut scratch = accel.allocate_image(1920, 1080, PixelFormat::RGBA8_INTERLEAVED)?;
//! accel.transfer(&src, &mut dst, 1.0, accel.stream(), &mut scratch)?;
//! ```

pub mod backend;
pub mod context;
pub mod kernel;

pub use backend::{
    Accelerator, AsAny, CpuAccelerator, CpuContext, CpuImage, CpuStream, CpuSurface, CpuTexture,
    DeviceLimits, FrameTexture, HandleId, ImageHandle, MemorySnapshot, TextureSurface,
    VramAccounting, format_bytes,
};
pub use context::{ContextGuard, ContextProvider, DeviceScope};
pub use kernel::{INPUT_IMAGE_0, OUTPUT_IMAGE_0, PARAM_STRENGTH, ReferenceKernel, UpscaleKernel};

use thiserror::Error;
use vsr_core::PixelFormat;

/// Device operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error("Failed to create buffer: {0}")]
    BufferCreation(String),

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Image too large: {width}x{height} exceeds device limit {limit}")]
    ImageTooLarge { width: u32, height: u32, limit: u32 },

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("Dimension mismatch: {from:?} vs {to:?}")]
    DimensionMismatch { from: (u32, u32), to: (u32, u32) },

    #[error("Unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: PixelFormat, to: PixelFormat },

    #[error("Handle does not belong to the {0} backend")]
    ForeignHandle(&'static str),

    #[error("Unknown kernel parameter: {0}")]
    UnknownParameter(String),

    #[error("Kernel slot {0} is not bound")]
    UnboundSlot(&'static str),

    #[error("Kernel slot {0} changed since the last load")]
    StaleBinding(&'static str),

    #[error("Kernel is not loaded")]
    NotLoaded,

    #[error("Memory budget exceeded: requested {requested} bytes, {available} available")]
    BudgetExceeded { requested: u64, available: u64 },

    #[error("Failed to acquire {0} context")]
    Context(String),

    #[error("Device operation failed: {0}")]
    OperationFailed(String),
}

pub type ComputeResult<T> = Result<T, ComputeError>;
