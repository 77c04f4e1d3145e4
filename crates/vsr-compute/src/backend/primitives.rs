//! Handle traits shared by all backends.

use std::sync::atomic::{AtomicU64, Ordering};

use vsr_core::{PixelFormat, Size};

use crate::ComputeResult;

/// Stable identity of a device image.
///
/// Preserved across in-place resizes; a new id means a new allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl HandleId {
    /// Issues a fresh id.
    pub fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to an image in device memory.
pub trait ImageHandle: Send + Sync + AsAny {
    /// Image dimensions (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Pixel format.
    fn format(&self) -> PixelFormat;

    /// Allocation identity.
    fn id(&self) -> HandleId;

    /// Reallocates storage for new dimensions, keeping the identity.
    ///
    /// Contents are undefined afterwards.
    fn resize(&mut self, width: u32, height: u32) -> ComputeResult<()>;

    /// Width.
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    /// Height.
    fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// Dimensions as a [`Size`].
    fn size(&self) -> Size {
        Size::from(self.dimensions())
    }

    /// Size in bytes of device memory used.
    fn size_bytes(&self) -> u64 {
        let (w, h) = self.dimensions();
        self.format().image_bytes(w, h)
    }
}

/// Helper trait for downcasting.
pub trait AsAny: 'static {
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// A frame as handed over by the host.
pub trait FrameTexture: Send + Sync {
    /// Texture dimensions (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Dimensions as a [`Size`].
    fn size(&self) -> Size {
        Size::from(self.dimensions())
    }
}

/// Device image that is also a graphics texture.
pub trait TextureSurface: ImageHandle {
    /// Texture type exposed to the host.
    type Texture: FrameTexture;

    /// Texture view of this surface.
    fn texture(&self) -> &Self::Texture;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ids_unique() {
        let a = HandleId::next();
        let b = HandleId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
