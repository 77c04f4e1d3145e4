//! Backend tests for vsr-compute.

use approx::assert_relative_eq;
use vsr_compute::{
    Accelerator, AsAny, ComputeError, ComputeResult, CpuAccelerator, CpuTexture, DeviceScope,
    HandleId, INPUT_IMAGE_0, ImageHandle, OUTPUT_IMAGE_0, PARAM_STRENGTH, ReferenceKernel,
    TextureSurface, UpscaleKernel,
};
use vsr_core::PixelFormat;

#[test]
fn test_cpu_backend_name() {
    let accel = CpuAccelerator::with_budget(0);
    assert_eq!(accel.name(), "cpu");
    assert!(accel.limits().max_dimension >= 4096);
}

#[test]
fn test_conversion_chain_preserves_color() {
    let accel = CpuAccelerator::with_budget(0);
    let stream = accel.stream();
    let frame = CpuTexture::gradient(8, 6, 3);

    let mut input = accel.allocate_surface(8, 6).unwrap();
    let mut fp32 = accel.allocate_image(8, 6, PixelFormat::RGBA_F32_PLANAR).unwrap();
    let mut bgr = accel.allocate_image(8, 6, PixelFormat::BGR_F32_PLANAR).unwrap();
    let mut u8_copy = accel.allocate_image(8, 6, PixelFormat::RGBA8_INTERLEAVED).unwrap();
    let mut output = accel.allocate_surface(8, 6).unwrap();
    let mut scratch = accel.allocate_image(8, 6, PixelFormat::RGBA8_INTERLEAVED).unwrap();

    accel.copy_texture(&frame, &mut input).unwrap();
    accel.transfer(&input, &mut fp32, 1.0, stream, &mut scratch).unwrap();
    accel.transfer(&fp32, &mut bgr, 1.0, stream, &mut scratch).unwrap();
    accel.transfer(&bgr, &mut u8_copy, 1.0, stream, &mut scratch).unwrap();
    accel.transfer(&u8_copy, &mut output, 1.0, stream, &mut scratch).unwrap();

    // alpha is dropped by BGR and comes back opaque; gradient alpha is 255 anyway
    assert_eq!(output.texture().data(), frame.data());
    assert_eq!(stream.ops(), 5);
}

#[test]
fn test_fp32_values_normalized() {
    let accel = CpuAccelerator::with_budget(0);
    let frame = CpuTexture::from_rgba8(vec![255, 51, 0, 255], 1, 1).unwrap();
    let mut input = accel.allocate_surface(1, 1).unwrap();
    let mut bgr = accel.allocate_image(1, 1, PixelFormat::BGR_F32_PLANAR).unwrap();
    let mut scratch = accel.allocate_image(1, 1, PixelFormat::RGBA8_INTERLEAVED).unwrap();

    accel.copy_texture(&frame, &mut input).unwrap();
    accel.transfer(&input, &mut bgr, 1.0, accel.stream(), &mut scratch).unwrap();

    let planes = bgr.as_f32().unwrap();
    assert_relative_eq!(planes[0], 0.0);
    assert_relative_eq!(planes[1], 0.2, epsilon = 1e-6);
    assert_relative_eq!(planes[2], 1.0);
}

#[test]
fn test_transfer_dimension_mismatch() {
    let accel = CpuAccelerator::with_budget(0);
    let src = accel.allocate_image(4, 4, PixelFormat::RGBA_F32_PLANAR).unwrap();
    let mut dst = accel.allocate_image(8, 8, PixelFormat::BGR_F32_PLANAR).unwrap();
    let mut scratch = accel.allocate_image(8, 8, PixelFormat::RGBA8_INTERLEAVED).unwrap();
    let err = accel
        .transfer(&src, &mut dst, 1.0, accel.stream(), &mut scratch)
        .unwrap_err();
    assert_eq!(err, ComputeError::DimensionMismatch { from: (4, 4), to: (8, 8) });
    assert_eq!(accel.stream().ops(), 0);
}

struct ForeignImage(HandleId);

impl AsAny for ForeignImage {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl ImageHandle for ForeignImage {
    fn dimensions(&self) -> (u32, u32) {
        (1, 1)
    }
    fn format(&self) -> PixelFormat {
        PixelFormat::RGBA8_INTERLEAVED
    }
    fn id(&self) -> HandleId {
        self.0
    }
    fn resize(&mut self, _: u32, _: u32) -> ComputeResult<()> {
        Ok(())
    }
}

#[test]
fn test_foreign_handle_rejected() {
    let accel = CpuAccelerator::with_budget(0);
    let src = ForeignImage(HandleId::next());
    let mut dst = accel.allocate_image(1, 1, PixelFormat::BGR_F32_PLANAR).unwrap();
    let mut scratch = accel.allocate_image(1, 1, PixelFormat::RGBA8_INTERLEAVED).unwrap();
    assert_eq!(
        accel.transfer(&src, &mut dst, 1.0, accel.stream(), &mut scratch),
        Err(ComputeError::ForeignHandle("cpu"))
    );
}

#[test]
fn test_budget_exceeded() {
    // 160x90 BGR f32 is 172800 bytes
    let accel = CpuAccelerator::with_budget(200_000);
    let _a = accel.allocate_image(160, 90, PixelFormat::BGR_F32_PLANAR).unwrap();
    let err = accel
        .allocate_image(160, 90, PixelFormat::BGR_F32_PLANAR)
        .err()
        .unwrap();
    assert!(matches!(err, ComputeError::BudgetExceeded { requested: 172_800, .. }));
}

#[test]
fn test_failed_resize_keeps_image() {
    let accel = CpuAccelerator::with_budget(1000);
    let mut img = accel.allocate_image(10, 10, PixelFormat::RGBA8_INTERLEAVED).unwrap();
    assert!(img.resize(100, 100).is_err());
    assert_eq!(img.dimensions(), (10, 10));
    assert_eq!(accel.memory().current, 400);
}

#[test]
fn test_resize_only_needs_net_growth() {
    // 400 B held, 900 B requested: fits a 1000 B budget once the old storage is returned
    let accel = CpuAccelerator::with_budget(1000);
    let mut img = accel.allocate_image(10, 10, PixelFormat::RGBA8_INTERLEAVED).unwrap();
    let id = img.id();
    img.resize(15, 15).unwrap();
    assert_eq!(img.dimensions(), (15, 15));
    assert_eq!(img.id(), id);
    assert_eq!(accel.memory().current, 900);

    let mut surface = accel.allocate_surface(5, 5).unwrap();
    assert!(surface.resize(6, 5).is_err());
    drop(img);
    surface.resize(15, 15).unwrap();
    assert_eq!(accel.memory().current, 900);
}

#[test]
fn test_scope_balanced() {
    let accel = CpuAccelerator::with_budget(0);
    {
        let _outer = DeviceScope::enter(&accel).unwrap();
        let _inner = DeviceScope::enter(&accel).unwrap();
        assert_eq!(accel.compute().depth(), 2);
        assert_eq!(accel.graphics().depth(), 2);
    }
    assert_eq!(accel.compute().depth(), 0);
    assert_eq!(accel.graphics().depth(), 0);
    assert_eq!(accel.compute().entries(), 2);
}

#[test]
fn test_reference_kernel_upscales() {
    let accel = CpuAccelerator::with_budget(0);
    let mut src = accel.allocate_image(2, 2, PixelFormat::BGR_F32_PLANAR).unwrap();
    let mut dst = accel.allocate_image(4, 4, PixelFormat::BGR_F32_PLANAR).unwrap();
    src.as_f32_mut().unwrap().fill(0.5);

    let mut kernel = ReferenceKernel::new();
    kernel.set_u32(PARAM_STRENGTH, 0).unwrap();
    kernel.set_image(INPUT_IMAGE_0, &src).unwrap();
    kernel.set_image(OUTPUT_IMAGE_0, &dst).unwrap();
    kernel.load(accel.stream()).unwrap();
    kernel.run(&src, &mut dst, accel.stream()).unwrap();

    for v in dst.as_f32().unwrap() {
        assert_relative_eq!(*v, 0.5, epsilon = 1e-6);
    }
}

#[test]
fn test_strength_applies_after_reload() {
    let accel = CpuAccelerator::with_budget(0);
    let src = accel.allocate_image(2, 2, PixelFormat::BGR_F32_PLANAR).unwrap();
    let dst = accel.allocate_image(4, 4, PixelFormat::BGR_F32_PLANAR).unwrap();

    let mut kernel = ReferenceKernel::new();
    kernel.set_image(INPUT_IMAGE_0, &src).unwrap();
    kernel.set_image(OUTPUT_IMAGE_0, &dst).unwrap();
    kernel.load(accel.stream()).unwrap();
    assert_eq!(kernel.loaded_strength(), Some(0));

    kernel.set_u32(PARAM_STRENGTH, 1).unwrap();
    assert_eq!(kernel.loaded_strength(), Some(0));
    kernel.load(accel.stream()).unwrap();
    assert_eq!(kernel.loaded_strength(), Some(1));
}
