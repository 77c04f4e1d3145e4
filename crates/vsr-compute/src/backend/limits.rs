//! Device resource limits.

use vsr_core::PixelFormat;

/// Default assumptions when device info is unavailable.
const DEFAULT_MEMORY_BYTES: u64 = 2 * 1024 * 1024 * 1024; // 2 GB
const DEFAULT_MAX_TEXTURE_DIM: u32 = 16384;
const DEFAULT_MAX_BUFFER_BYTES: u64 = 1024 * 1024 * 1024; // 1 GB

/// Memory safety margin - use at most 80% of device memory.
const MEMORY_SAFETY_MARGIN: f64 = 0.2;

/// Device resource limits.
#[derive(Debug, Clone)]
pub struct DeviceLimits {
    /// Maximum image dimension (width or height).
    pub max_dimension: u32,
    /// Maximum single buffer size in bytes.
    pub max_buffer_bytes: u64,
    /// Total device memory in bytes (detected or estimated).
    pub total_memory: u64,
    /// Available device memory in bytes (after safety margin).
    pub available_memory: u64,
    /// Whether values were auto-detected vs defaults.
    pub detected: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_TEXTURE_DIM,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            total_memory: DEFAULT_MEMORY_BYTES,
            available_memory: (DEFAULT_MEMORY_BYTES as f64 * (1.0 - MEMORY_SAFETY_MARGIN)) as u64,
            detected: false,
        }
    }
}

impl DeviceLimits {
    /// Creates limits with the given memory size (applies safety margin).
    pub fn with_memory(total_bytes: u64) -> Self {
        Self {
            total_memory: total_bytes,
            available_memory: (total_bytes as f64 * (1.0 - MEMORY_SAFETY_MARGIN)) as u64,
            detected: true,
            ..Self::default()
        }
    }

    /// Whether an image of this size can be allocated at all.
    pub fn fits(&self, width: u32, height: u32, format: PixelFormat) -> bool {
        width <= self.max_dimension
            && height <= self.max_dimension
            && format.image_bytes(width, height) <= self.max_buffer_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_memory_margin() {
        let limits = DeviceLimits::with_memory(1000);
        assert_eq!(limits.available_memory, 800);
        assert!(limits.detected);
    }

    #[test]
    fn test_fits() {
        let limits = DeviceLimits::default();
        assert!(limits.fits(3840, 2160, PixelFormat::BGR_F32_PLANAR));
        assert!(!limits.fits(20000, 10, PixelFormat::RGBA8_INTERLEAVED));
    }
}
