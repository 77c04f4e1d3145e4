//! CPU backend using rayon for parallelization.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{trace, warn};
use vsr_core::{ComponentType, PixelFormat};

use super::convert::{self, Pixels, PixelsMut, View, ViewMut};
use super::memory::{self, MemorySnapshot, VramAccounting};
use super::primitives::{AsAny, FrameTexture, HandleId, ImageHandle, TextureSurface};
use super::{Accelerator, DeviceLimits};
use crate::context::ContextProvider;
use crate::{ComputeError, ComputeResult};

const BACKEND_NAME: &str = "cpu";

/// Host-side RGBA8 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuTexture {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl CpuTexture {
    /// Black, fully transparent texture.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    /// Wraps interleaved RGBA8 bytes.
    pub fn from_rgba8(data: Vec<u8>, width: u32, height: u32) -> ComputeResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Synthetic test frame: diagonal gradient shifted by `phase`.
    pub fn gradient(width: u32, height: u32, phase: u32) -> Self {
        let mut tex = Self::new(width, height);
        let w = width.max(1) as usize;
        let span = (width + height).max(1);
        tex.data.par_chunks_mut(4).enumerate().for_each(|(i, px)| {
            let (x, y) = ((i % w) as u32, (i / w) as u32);
            let ramp = |v: u32| (v.wrapping_add(phase) % span * 255 / span) as u8;
            px[0] = ramp(x);
            px[1] = ramp(y);
            px[2] = ramp(x + y);
            px[3] = 255;
        });
        tex
    }

    /// Raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes as RGBA pixels.
    pub fn pixels(&self) -> ComputeResult<&[[u8; 4]]> {
        bytemuck::try_cast_slice(&self.data)
            .map_err(|e| ComputeError::OperationFailed(e.to_string()))
    }

    /// Mutable bytes as RGBA pixels.
    pub fn pixels_mut(&mut self) -> ComputeResult<&mut [[u8; 4]]> {
        bytemuck::try_cast_slice_mut(&mut self.data)
            .map_err(|e| ComputeError::OperationFailed(e.to_string()))
    }

    /// Pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl FrameTexture for CpuTexture {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

enum Storage {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl Storage {
    fn zeroed(format: PixelFormat, width: u32, height: u32) -> Self {
        let len = format.component_count(width, height);
        match format.component {
            ComponentType::U8 => Self::U8(vec![0; len]),
            ComponentType::F32 => Self::F32(vec![0.0; len]),
        }
    }
}

/// CPU image handle - data stored in RAM.
pub struct CpuImage {
    id: HandleId,
    format: PixelFormat,
    width: u32,
    height: u32,
    storage: Storage,
    accounting: Arc<VramAccounting>,
}

impl CpuImage {
    fn allocate(
        format: PixelFormat,
        width: u32,
        height: u32,
        accounting: Arc<VramAccounting>,
    ) -> ComputeResult<Self> {
        accounting.try_reserve(format.image_bytes(width, height))?;
        Ok(Self {
            id: HandleId::next(),
            format,
            width,
            height,
            storage: Storage::zeroed(format, width, height),
            accounting,
        })
    }

    /// Float samples, if this is a float image.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.storage {
            Storage::F32(d) => Some(d),
            Storage::U8(_) => None,
        }
    }

    /// Mutable float samples, if this is a float image.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.storage {
            Storage::F32(d) => Some(d),
            Storage::U8(_) => None,
        }
    }

    /// Byte samples, if this is an 8-bit image.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::U8(d) => Some(d),
            Storage::F32(_) => None,
        }
    }

    fn view(&self) -> View<'_> {
        View {
            pixels: match &self.storage {
                Storage::U8(d) => Pixels::U8(d),
                Storage::F32(d) => Pixels::F32(d),
            },
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut {
            pixels: match &mut self.storage {
                Storage::U8(d) => PixelsMut::U8(d),
                Storage::F32(d) => PixelsMut::F32(d),
            },
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }
}

impl Drop for CpuImage {
    fn drop(&mut self) {
        self.accounting.release(self.size_bytes());
    }
}

impl AsAny for CpuImage {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl ImageHandle for CpuImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn id(&self) -> HandleId {
        self.id
    }

    fn resize(&mut self, width: u32, height: u32) -> ComputeResult<()> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        self.accounting
            .try_exchange(self.size_bytes(), self.format.image_bytes(width, height))?;
        self.storage = Storage::zeroed(self.format, width, height);
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// Texture-backed RGBA8 image.
pub struct CpuSurface {
    id: HandleId,
    texture: CpuTexture,
    accounting: Arc<VramAccounting>,
}

impl CpuSurface {
    fn view(&self) -> View<'_> {
        View {
            pixels: Pixels::U8(&self.texture.data),
            format: PixelFormat::RGBA8_INTERLEAVED,
            width: self.texture.width,
            height: self.texture.height,
        }
    }

    fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut {
            pixels: PixelsMut::U8(&mut self.texture.data),
            format: PixelFormat::RGBA8_INTERLEAVED,
            width: self.texture.width,
            height: self.texture.height,
        }
    }
}

impl Drop for CpuSurface {
    fn drop(&mut self) {
        self.accounting.release(self.size_bytes());
    }
}

impl AsAny for CpuSurface {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl ImageHandle for CpuSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.texture.dimensions()
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::RGBA8_INTERLEAVED
    }

    fn id(&self) -> HandleId {
        self.id
    }

    fn resize(&mut self, width: u32, height: u32) -> ComputeResult<()> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        self.accounting.try_exchange(
            self.size_bytes(),
            PixelFormat::RGBA8_INTERLEAVED.image_bytes(width, height),
        )?;
        self.texture = CpuTexture::new(width, height);
        Ok(())
    }
}

impl TextureSurface for CpuSurface {
    type Texture = CpuTexture;

    fn texture(&self) -> &CpuTexture {
        &self.texture
    }
}

/// Re-entrant context with an observable nesting depth.
#[derive(Debug)]
pub struct CpuContext {
    name: &'static str,
    depth: AtomicUsize,
    entries: AtomicU64,
}

impl CpuContext {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            depth: AtomicUsize::new(0),
            entries: AtomicU64::new(0),
        }
    }

    /// Current nesting depth; 0 when no scope is open.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Total number of acquisitions so far.
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }
}

impl ContextProvider for CpuContext {
    fn acquire(&self) -> ComputeResult<()> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.entries.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self) {
        let res = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1));
        if res.is_err() {
            warn!(context = self.name, "release without matching acquire");
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// In-order stream. Work runs synchronously; only submissions are counted.
#[derive(Debug, Default)]
pub struct CpuStream {
    ops: AtomicU64,
}

impl CpuStream {
    /// Records one submitted operation.
    pub fn record(&self) {
        self.ops.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of operations submitted so far.
    pub fn ops(&self) -> u64 {
        self.ops.load(Ordering::Relaxed)
    }
}

/// CPU accelerator: RAM-resident images, rayon conversions.
pub struct CpuAccelerator {
    limits: DeviceLimits,
    accounting: Arc<VramAccounting>,
    compute: CpuContext,
    graphics: CpuContext,
    stream: CpuStream,
}

impl CpuAccelerator {
    /// Accelerator with the budget from [`memory::device_budget`].
    pub fn new() -> Self {
        Self::with_budget(memory::device_budget())
    }

    /// Accelerator with an explicit budget in bytes (0 = unlimited).
    pub fn with_budget(budget: u64) -> Self {
        let mut limits = DeviceLimits::with_memory(memory::system_memory());
        if budget > 0 {
            limits.available_memory = budget;
        }
        Self {
            limits,
            accounting: Arc::new(VramAccounting::new(budget)),
            compute: CpuContext::new("compute"),
            graphics: CpuContext::new("graphics"),
            stream: CpuStream::default(),
        }
    }

    /// Allocation counters.
    pub fn accounting(&self) -> &VramAccounting {
        &self.accounting
    }

    /// Current allocation counters.
    pub fn memory(&self) -> MemorySnapshot {
        self.accounting.snapshot()
    }

    /// Compute context.
    pub fn compute(&self) -> &CpuContext {
        &self.compute
    }

    /// Graphics context.
    pub fn graphics(&self) -> &CpuContext {
        &self.graphics
    }

    fn check(&self, width: u32, height: u32, format: PixelFormat) -> ComputeResult<()> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        if !self.limits.fits(width, height, format) {
            return Err(ComputeError::ImageTooLarge {
                width,
                height,
                limit: self.limits.max_dimension,
            });
        }
        Ok(())
    }
}

impl Default for CpuAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

fn view(handle: &dyn ImageHandle) -> ComputeResult<View<'_>> {
    let any = handle.as_any();
    if let Some(img) = any.downcast_ref::<CpuImage>() {
        return Ok(img.view());
    }
    any.downcast_ref::<CpuSurface>()
        .map(CpuSurface::view)
        .ok_or(ComputeError::ForeignHandle(BACKEND_NAME))
}

fn view_mut(handle: &mut dyn ImageHandle) -> ComputeResult<ViewMut<'_>> {
    let any = handle.as_any_mut();
    if any.is::<CpuImage>() {
        return any
            .downcast_mut::<CpuImage>()
            .map(CpuImage::view_mut)
            .ok_or(ComputeError::ForeignHandle(BACKEND_NAME));
    }
    any.downcast_mut::<CpuSurface>()
        .map(CpuSurface::view_mut)
        .ok_or(ComputeError::ForeignHandle(BACKEND_NAME))
}

/// Nearest-neighbour stretch of `src` onto `dst`.
fn blit(src: &CpuTexture, dst: &mut CpuTexture) -> ComputeResult<()> {
    if src.dimensions() == dst.dimensions() {
        dst.data.copy_from_slice(&src.data);
        return Ok(());
    }
    let (sw, sh) = (src.width as usize, src.height as usize);
    let (dw, dh) = (dst.width as usize, dst.height as usize);
    if sw == 0 || sh == 0 {
        return Err(ComputeError::InvalidDimensions(src.width, src.height));
    }

    let src_px = src.pixels()?;
    let dst_px = dst.pixels_mut()?;
    dst_px.par_chunks_mut(dw).enumerate().for_each(|(y, row)| {
        let sy = (y * sh / dh).min(sh - 1);
        for (x, px) in row.iter_mut().enumerate() {
            let sx = (x * sw / dw).min(sw - 1);
            *px = src_px[sy * sw + sx];
        }
    });
    Ok(())
}

impl Accelerator for CpuAccelerator {
    type Texture = CpuTexture;
    type Image = CpuImage;
    type Surface = CpuSurface;
    type Stream = CpuStream;

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn compute_context(&self) -> &dyn ContextProvider {
        &self.compute
    }

    fn graphics_context(&self) -> &dyn ContextProvider {
        &self.graphics
    }

    fn stream(&self) -> &CpuStream {
        &self.stream
    }

    fn allocate_image(&self, width: u32, height: u32, format: PixelFormat) -> ComputeResult<CpuImage> {
        self.check(width, height, format)?;
        let image = CpuImage::allocate(format, width, height, Arc::clone(&self.accounting))?;
        trace!(id = %image.id, %format, width, height, "allocated image");
        Ok(image)
    }

    fn allocate_surface(&self, width: u32, height: u32) -> ComputeResult<CpuSurface> {
        let format = PixelFormat::RGBA8_INTERLEAVED;
        self.check(width, height, format)?;
        self.accounting.try_reserve(format.image_bytes(width, height))?;
        let surface = CpuSurface {
            id: HandleId::next(),
            texture: CpuTexture::new(width, height),
            accounting: Arc::clone(&self.accounting),
        };
        trace!(id = %surface.id, width, height, "allocated surface");
        Ok(surface)
    }

    fn copy_texture(&self, src: &CpuTexture, dst: &mut CpuSurface) -> ComputeResult<()> {
        blit(src, &mut dst.texture)?;
        self.stream.record();
        Ok(())
    }

    fn transfer(
        &self,
        src: &dyn ImageHandle,
        dst: &mut dyn ImageHandle,
        scale: f32,
        stream: &CpuStream,
        _scratch: &mut CpuImage,
    ) -> ComputeResult<()> {
        let src_view = view(src)?;
        let mut dst_view = view_mut(dst)?;
        trace!(from = %src_view.format, to = %dst_view.format, scale, "transfer");
        convert::convert(&src_view, &mut dst_view, scale)?;
        stream.record();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_keeps_identity() {
        let accel = CpuAccelerator::with_budget(0);
        let mut img = accel.allocate_image(4, 4, PixelFormat::BGR_F32_PLANAR).unwrap();
        let id = img.id();
        img.resize(8, 2).unwrap();
        assert_eq!(img.id(), id);
        assert_eq!(img.dimensions(), (8, 2));
        assert_eq!(img.as_f32().unwrap().len(), 8 * 2 * 3);
        assert_eq!(accel.memory().current, 8 * 2 * 12);
    }

    #[test]
    fn test_drop_releases_memory() {
        let accel = CpuAccelerator::with_budget(0);
        {
            let _a = accel.allocate_surface(10, 10).unwrap();
            let _b = accel.allocate_image(10, 10, PixelFormat::RGBA_F32_PLANAR).unwrap();
            assert_eq!(accel.memory().current, 400 + 1600);
        }
        assert_eq!(accel.memory().current, 0);
        assert_eq!(accel.memory().peak, 2000);
    }

    #[test]
    fn test_zero_dims_rejected() {
        let accel = CpuAccelerator::with_budget(0);
        assert_eq!(
            accel.allocate_surface(0, 10).err(),
            Some(ComputeError::InvalidDimensions(0, 10))
        );
    }

    #[test]
    fn test_stretch_copy() {
        let accel = CpuAccelerator::with_budget(0);
        let src = CpuTexture::from_rgba8(vec![10, 20, 30, 255, 40, 50, 60, 255], 2, 1).unwrap();
        let mut dst = accel.allocate_surface(4, 2).unwrap();
        accel.copy_texture(&src, &mut dst).unwrap();
        let tex = dst.texture();
        assert_eq!(tex.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(tex.pixel(1, 1), Some([10, 20, 30, 255]));
        assert_eq!(tex.pixel(3, 1), Some([40, 50, 60, 255]));
        assert_eq!(accel.stream().ops(), 1);
    }

    #[test]
    fn test_unbalanced_release_saturates() {
        let ctx = CpuContext::new("test");
        ctx.release();
        assert_eq!(ctx.depth(), 0);
    }
}
