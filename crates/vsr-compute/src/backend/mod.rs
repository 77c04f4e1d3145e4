//! Accelerator backends.
//!
//! # Architecture
//!
//! ```text
//! Accelerator
//!     ├── Texture  (caller-visible frame, FrameTexture)
//!     ├── Image    (device image, ImageHandle)
//!     ├── Surface  (device image backed by a texture, TextureSurface)
//!     └── Stream   (execution queue)
//! ```
//!
//! The CPU backend keeps every buffer in RAM and runs conversions with
//! rayon. It is the reference implementation the effect is tested against.

mod convert;
mod cpu_backend;
mod limits;
pub mod memory;
mod primitives;

pub use cpu_backend::{CpuAccelerator, CpuContext, CpuImage, CpuStream, CpuSurface, CpuTexture};
pub use limits::DeviceLimits;
pub use memory::{MemorySnapshot, VramAccounting, format_bytes};
pub use primitives::{AsAny, FrameTexture, HandleId, ImageHandle, TextureSurface};

use vsr_core::PixelFormat;

use crate::ComputeResult;
use crate::context::ContextProvider;

/// Device operations needed by the upscaling effect.
///
/// All methods take `&self`; backends are shared between effect instances
/// behind an `Arc`. Callers hold a [`DeviceScope`](crate::DeviceScope)
/// around every call.
pub trait Accelerator: Send + Sync {
    /// Caller-visible frame type.
    type Texture: FrameTexture;
    /// Device image type.
    type Image: ImageHandle;
    /// Device image that can be read back as a texture.
    type Surface: TextureSurface<Texture = Self::Texture>;
    /// Execution stream.
    type Stream: Send + Sync;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Device limits.
    fn limits(&self) -> &DeviceLimits;

    /// Accelerator (compute) context.
    fn compute_context(&self) -> &dyn ContextProvider;

    /// Graphics context.
    fn graphics_context(&self) -> &dyn ContextProvider;

    /// Stream all work is submitted to.
    fn stream(&self) -> &Self::Stream;

    /// Allocates a device image.
    fn allocate_image(&self, width: u32, height: u32, format: PixelFormat)
        -> ComputeResult<Self::Image>;

    /// Allocates a texture-backed RGBA8 image.
    fn allocate_surface(&self, width: u32, height: u32) -> ComputeResult<Self::Surface>;

    /// Copies a caller texture into a surface.
    fn copy_texture(&self, src: &Self::Texture, dst: &mut Self::Surface) -> ComputeResult<()>;

    /// Converts `src` into `dst`'s format, multiplying values by `scale`.
    ///
    /// Dimensions must match. `scratch` is a workspace the backend may use
    /// for staging.
    fn transfer(
        &self,
        src: &dyn ImageHandle,
        dst: &mut dyn ImageHandle,
        scale: f32,
        stream: &Self::Stream,
        scratch: &mut Self::Image,
    ) -> ComputeResult<()>;
}
