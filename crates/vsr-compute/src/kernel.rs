//! Upscaling kernel interface.
//!
//! A kernel is an opaque device program with named parameters. Image slots
//! and the strength parameter are bound with setters, then [`load`] bakes
//! the current bindings into a runnable state. Bindings that change after a
//! load only take effect after the next load.
//!
//! [`load`]: UpscaleKernel::load

use rayon::prelude::*;
use tracing::debug;
use vsr_core::{ComponentLayout, ComponentType, PixelFormat, PixelOrder};

use crate::backend::{CpuImage, CpuStream, HandleId, ImageHandle};
use crate::{ComputeError, ComputeResult};

/// Strength parameter (u32, 0 or 1).
pub const PARAM_STRENGTH: &str = "Strength";
/// Source image slot.
pub const INPUT_IMAGE_0: &str = "SrcImage0";
/// Destination image slot.
pub const OUTPUT_IMAGE_0: &str = "DstImage0";

/// Sharpening amount applied at strength 1.
const SHARPEN_AMOUNT: f32 = 0.5;

/// Super-resolution kernel.
pub trait UpscaleKernel: Send {
    /// Device image type the kernel reads and writes.
    type Image: ImageHandle;
    /// Stream type the kernel runs on.
    type Stream;

    /// Makes the current bindings runnable.
    fn load(&mut self, stream: &Self::Stream) -> ComputeResult<()>;

    /// Sets an integer parameter.
    fn set_u32(&mut self, name: &str, value: u32) -> ComputeResult<()>;

    /// Binds an image slot.
    fn set_image(&mut self, name: &str, image: &Self::Image) -> ComputeResult<()>;

    /// Runs the kernel from `source` into `destination`.
    fn run(
        &mut self,
        source: &Self::Image,
        destination: &mut Self::Image,
        stream: &Self::Stream,
    ) -> ComputeResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    id: HandleId,
    dims: (u32, u32),
}

impl Binding {
    fn of(image: &dyn ImageHandle) -> Self {
        Self {
            id: image.id(),
            dims: image.dimensions(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Loaded {
    source: Binding,
    destination: Binding,
    strength: u32,
}

/// CPU stand-in for a neural upscaler.
///
/// Bilinear upscale of planar BGR float images, followed by an unsharp mask
/// when strength is 1. Slot bindings are checked strictly: running with an
/// image that was not bound at load time, or that was resized since, fails
/// with [`ComputeError::StaleBinding`].
#[derive(Debug, Default)]
pub struct ReferenceKernel {
    strength: u32,
    source: Option<Binding>,
    destination: Option<Binding>,
    loaded: Option<Loaded>,
    loads: u64,
    runs: u64,
}

impl ReferenceKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful loads.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// Number of successful runs.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Strength baked in by the last load.
    pub fn loaded_strength(&self) -> Option<u32> {
        self.loaded.map(|l| l.strength)
    }

    fn check_format(slot: &'static str, format: PixelFormat) -> ComputeResult<()> {
        let ok = format.order == PixelOrder::Bgr
            && format.component == ComponentType::F32
            && format.layout == ComponentLayout::Planar;
        if !ok {
            debug!(slot, %format, "rejected image format");
            return Err(ComputeError::UnsupportedConversion {
                from: format,
                to: PixelFormat::BGR_F32_PLANAR,
            });
        }
        Ok(())
    }

    fn check_slot(
        slot: &'static str,
        loaded: Binding,
        current: Option<Binding>,
        image: &CpuImage,
    ) -> ComputeResult<()> {
        if current != Some(loaded) || Binding::of(image) != loaded {
            return Err(ComputeError::StaleBinding(slot));
        }
        Ok(())
    }
}

impl UpscaleKernel for ReferenceKernel {
    type Image = CpuImage;
    type Stream = CpuStream;

    fn load(&mut self, stream: &CpuStream) -> ComputeResult<()> {
        let source = self.source.ok_or(ComputeError::UnboundSlot(INPUT_IMAGE_0))?;
        let destination = self
            .destination
            .ok_or(ComputeError::UnboundSlot(OUTPUT_IMAGE_0))?;
        self.loaded = Some(Loaded {
            source,
            destination,
            strength: self.strength,
        });
        self.loads += 1;
        stream.record();
        debug!(
            src = ?source.dims,
            dst = ?destination.dims,
            strength = self.strength,
            "reference kernel loaded"
        );
        Ok(())
    }

    fn set_u32(&mut self, name: &str, value: u32) -> ComputeResult<()> {
        match name {
            PARAM_STRENGTH => {
                self.strength = value.min(1);
                Ok(())
            }
            _ => Err(ComputeError::UnknownParameter(name.to_string())),
        }
    }

    fn set_image(&mut self, name: &str, image: &CpuImage) -> ComputeResult<()> {
        match name {
            INPUT_IMAGE_0 => {
                Self::check_format(INPUT_IMAGE_0, image.format())?;
                self.source = Some(Binding::of(image));
            }
            OUTPUT_IMAGE_0 => {
                Self::check_format(OUTPUT_IMAGE_0, image.format())?;
                self.destination = Some(Binding::of(image));
            }
            _ => return Err(ComputeError::UnknownParameter(name.to_string())),
        }
        Ok(())
    }

    fn run(
        &mut self,
        source: &CpuImage,
        destination: &mut CpuImage,
        stream: &CpuStream,
    ) -> ComputeResult<()> {
        let loaded = self.loaded.ok_or(ComputeError::NotLoaded)?;
        Self::check_slot(INPUT_IMAGE_0, loaded.source, self.source, source)?;
        Self::check_slot(OUTPUT_IMAGE_0, loaded.destination, self.destination, destination)?;

        let (sw, sh) = source.dimensions();
        let (dw, dh) = destination.dimensions();
        let src = source
            .as_f32()
            .ok_or(ComputeError::ForeignHandle("reference kernel"))?;
        let dst = destination
            .as_f32_mut()
            .ok_or(ComputeError::ForeignHandle("reference kernel"))?;

        let src_plane = sw as usize * sh as usize;
        let dst_plane = dw as usize * dh as usize;
        for (s, d) in src.chunks_exact(src_plane).zip(dst.chunks_exact_mut(dst_plane)) {
            bilinear(s, sw as usize, sh as usize, d, dw as usize, dh as usize);
            if loaded.strength == 1 {
                unsharp(d, dw as usize, dh as usize, SHARPEN_AMOUNT);
            }
        }

        self.runs += 1;
        stream.record();
        Ok(())
    }
}

/// Bilinear resample of one plane, pixel-center aligned.
fn bilinear(src: &[f32], sw: usize, sh: usize, dst: &mut [f32], dw: usize, dh: usize) {
    let fx = sw as f32 / dw as f32;
    let fy = sh as f32 / dh as f32;

    dst.par_chunks_mut(dw).enumerate().for_each(|(y, row)| {
        let sy = ((y as f32 + 0.5) * fy - 0.5).clamp(0.0, (sh - 1) as f32);
        let y0 = sy as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let ty = sy - y0 as f32;

        for (x, out) in row.iter_mut().enumerate() {
            let sx = ((x as f32 + 0.5) * fx - 0.5).clamp(0.0, (sw - 1) as f32);
            let x0 = sx as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let tx = sx - x0 as f32;

            let top = src[y0 * sw + x0] * (1.0 - tx) + src[y0 * sw + x1] * tx;
            let bottom = src[y1 * sw + x0] * (1.0 - tx) + src[y1 * sw + x1] * tx;
            *out = top * (1.0 - ty) + bottom * ty;
        }
    });
}

/// In-place 3x3 unsharp mask with clamped edges.
fn unsharp(plane: &mut [f32], w: usize, h: usize, amount: f32) {
    let orig = plane.to_vec();

    plane.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for dy in [-1isize, 0, 1] {
                let yy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                for dx in [-1isize, 0, 1] {
                    let xx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                    sum += orig[yy * w + xx];
                }
            }
            let v = orig[y * w + x];
            *out = v + amount * (v - sum / 9.0);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Accelerator, CpuAccelerator};
    use approx::assert_relative_eq;

    fn setup(accel: &CpuAccelerator) -> (CpuImage, CpuImage) {
        let src = accel.allocate_image(2, 2, PixelFormat::BGR_F32_PLANAR).unwrap();
        let dst = accel.allocate_image(4, 4, PixelFormat::BGR_F32_PLANAR).unwrap();
        (src, dst)
    }

    #[test]
    fn test_run_requires_load() {
        let accel = CpuAccelerator::with_budget(0);
        let (src, mut dst) = setup(&accel);
        let mut k = ReferenceKernel::new();
        k.set_image(INPUT_IMAGE_0, &src).unwrap();
        k.set_image(OUTPUT_IMAGE_0, &dst).unwrap();
        assert_eq!(k.run(&src, &mut dst, accel.stream()), Err(ComputeError::NotLoaded));
    }

    #[test]
    fn test_load_requires_bindings() {
        let accel = CpuAccelerator::with_budget(0);
        let (src, _dst) = setup(&accel);
        let mut k = ReferenceKernel::new();
        k.set_image(INPUT_IMAGE_0, &src).unwrap();
        assert_eq!(
            k.load(accel.stream()),
            Err(ComputeError::UnboundSlot(OUTPUT_IMAGE_0))
        );
    }

    #[test]
    fn test_resized_binding_is_stale() {
        let accel = CpuAccelerator::with_budget(0);
        let (mut src, mut dst) = setup(&accel);
        let mut k = ReferenceKernel::new();
        k.set_image(INPUT_IMAGE_0, &src).unwrap();
        k.set_image(OUTPUT_IMAGE_0, &dst).unwrap();
        k.load(accel.stream()).unwrap();
        k.run(&src, &mut dst, accel.stream()).unwrap();

        src.resize(3, 3).unwrap();
        assert_eq!(
            k.run(&src, &mut dst, accel.stream()),
            Err(ComputeError::StaleBinding(INPUT_IMAGE_0))
        );
        k.set_image(INPUT_IMAGE_0, &src).unwrap();
        k.load(accel.stream()).unwrap();
        k.run(&src, &mut dst, accel.stream()).unwrap();
        assert_eq!(k.loads(), 2);
        assert_eq!(k.runs(), 2);
    }

    #[test]
    fn test_unknown_parameter() {
        let mut k = ReferenceKernel::new();
        assert!(matches!(
            k.set_u32("Quality", 1),
            Err(ComputeError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_rejects_rgba_slot() {
        let accel = CpuAccelerator::with_budget(0);
        let img = accel.allocate_image(2, 2, PixelFormat::RGBA_F32_PLANAR).unwrap();
        let mut k = ReferenceKernel::new();
        assert!(k.set_image(INPUT_IMAGE_0, &img).is_err());
    }

    #[test]
    fn test_flat_plane_stays_flat() {
        let plane = vec![0.25f32; 9];
        let mut out = vec![0.0f32; 36];
        bilinear(&plane, 3, 3, &mut out, 6, 6);
        unsharp(&mut out, 6, 6, SHARPEN_AMOUNT);
        for v in out {
            assert_relative_eq!(v, 0.25, epsilon = 1e-6);
        }
    }
}
