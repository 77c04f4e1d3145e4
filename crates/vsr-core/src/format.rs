//! Pixel formats of device buffers.
//!
//! A device buffer is tagged with four independent properties, matching how
//! accelerator SDKs describe image memory:
//!
//! - [`PixelOrder`] - which color channels are stored and in what order
//! - [`ComponentType`] - storage type of a single channel value
//! - [`ComponentLayout`] - interleaved (`RGBARGBA...`) or planar (`RRR...GGG...`)
//! - [`MemoryLocation`] - where the buffer lives
//!
//! The buffer pipeline only needs a handful of combinations; they are
//! exposed as associated constants on [`PixelFormat`].
//!
//! # Usage
//!
//! ```rust
//! use vsr_core::format::{PixelFormat, ComponentType};
//!
//! let f = PixelFormat::BGR_F32_PLANAR;
//! assert_eq!(f.channels(), 3);
//! assert_eq!(f.component, ComponentType::F32);
//! assert_eq!(f.bytes_per_pixel(), 12);
//! ```

use std::fmt;

/// Channel order of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelOrder {
    /// Red, green, blue, alpha.
    #[default]
    Rgba,
    /// Blue, green, red (no alpha).
    Bgr,
}

impl PixelOrder {
    /// Number of channels.
    #[inline]
    pub const fn channels(&self) -> u32 {
        match self {
            Self::Rgba => 4,
            Self::Bgr => 3,
        }
    }

    /// Whether an alpha channel is stored.
    #[inline]
    pub const fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba)
    }
}

/// Storage type of one channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    /// 8-bit unsigned integer, normalized over [0, 255].
    #[default]
    U8,
    /// 32-bit single-precision float.
    F32,
}

impl ComponentType {
    /// Number of bytes per channel value.
    #[inline]
    pub const fn bytes(&self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::F32 => 4,
        }
    }

    /// Whether this is a floating-point type.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32)
    }
}

/// Arrangement of channel values in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentLayout {
    /// All channels of a pixel are adjacent.
    #[default]
    Interleaved,
    /// Each channel is stored as a separate full-size plane.
    Planar,
}

/// Residency of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryLocation {
    /// Device memory.
    #[default]
    Gpu,
    /// Host memory.
    Cpu,
}

/// Full description of a buffer's pixel storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelFormat {
    /// Channel order.
    pub order: PixelOrder,
    /// Channel storage type.
    pub component: ComponentType,
    /// Channel arrangement.
    pub layout: ComponentLayout,
    /// Residency.
    pub location: MemoryLocation,
}

impl PixelFormat {
    /// Interleaved 8-bit RGBA in device memory (textures, u8 working copy, scratch).
    pub const RGBA8_INTERLEAVED: Self = Self::new(
        PixelOrder::Rgba,
        ComponentType::U8,
        ComponentLayout::Interleaved,
        MemoryLocation::Gpu,
    );

    /// Planar 32-bit float RGBA in device memory.
    pub const RGBA_F32_PLANAR: Self = Self::new(
        PixelOrder::Rgba,
        ComponentType::F32,
        ComponentLayout::Planar,
        MemoryLocation::Gpu,
    );

    /// Planar 32-bit float BGR in device memory (kernel source/destination).
    pub const BGR_F32_PLANAR: Self = Self::new(
        PixelOrder::Bgr,
        ComponentType::F32,
        ComponentLayout::Planar,
        MemoryLocation::Gpu,
    );

    /// Creates a pixel format from its parts.
    #[inline]
    pub const fn new(
        order: PixelOrder,
        component: ComponentType,
        layout: ComponentLayout,
        location: MemoryLocation,
    ) -> Self {
        Self {
            order,
            component,
            layout,
            location,
        }
    }

    /// Number of channels.
    #[inline]
    pub const fn channels(&self) -> u32 {
        self.order.channels()
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> u32 {
        self.order.channels() * self.component.bytes()
    }

    /// Number of channel values for an image of `width` x `height`.
    #[inline]
    pub const fn component_count(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.order.channels() as usize
    }

    /// Bytes needed for an image of `width` x `height`.
    #[inline]
    pub const fn image_bytes(&self, width: u32, height: u32) -> u64 {
        width as u64 * height as u64 * self.bytes_per_pixel() as u64
    }

    /// Same format with a different residency.
    #[inline]
    pub const fn with_location(self, location: MemoryLocation) -> Self {
        Self { location, ..self }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.order {
            PixelOrder::Rgba => "rgba",
            PixelOrder::Bgr => "bgr",
        };
        let component = match self.component {
            ComponentType::U8 => "u8",
            ComponentType::F32 => "f32",
        };
        let layout = match self.layout {
            ComponentLayout::Interleaved => "interleaved",
            ComponentLayout::Planar => "planar",
        };
        let location = match self.location {
            MemoryLocation::Gpu => "gpu",
            MemoryLocation::Cpu => "cpu",
        };
        write!(f, "{order}/{component}/{layout}@{location}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(PixelFormat::RGBA8_INTERLEAVED.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::RGBA_F32_PLANAR.bytes_per_pixel(), 16);
        assert_eq!(PixelFormat::BGR_F32_PLANAR.image_bytes(160, 90), 160 * 90 * 12);
        assert_eq!(PixelFormat::BGR_F32_PLANAR.component_count(2, 2), 12);
    }

    #[test]
    fn test_display() {
        assert_eq!(PixelFormat::RGBA8_INTERLEAVED.to_string(), "rgba/u8/interleaved@gpu");
        assert_eq!(
            PixelFormat::BGR_F32_PLANAR.with_location(MemoryLocation::Cpu).to_string(),
            "bgr/f32/planar@cpu"
        );
    }
}
