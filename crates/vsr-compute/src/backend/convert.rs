//! Pixel format conversion for the CPU backend.
//!
//! Every conversion goes through normalized RGBA floats: 8-bit values are
//! divided by 255, float values are taken as-is, missing alpha reads as 1.
//! Encoding reverses that, rounding and saturating 8-bit outputs. The
//! transfer scale multiplies every normalized value in between.

use rayon::prelude::*;
use vsr_core::{ComponentLayout, PixelFormat, PixelOrder};

use crate::{ComputeError, ComputeResult};

/// Borrowed pixel storage.
pub(crate) enum Pixels<'a> {
    U8(&'a [u8]),
    F32(&'a [f32]),
}

/// Mutably borrowed pixel storage.
pub(crate) enum PixelsMut<'a> {
    U8(&'a mut [u8]),
    F32(&'a mut [f32]),
}

/// Source side of a conversion.
pub(crate) struct View<'a> {
    pub pixels: Pixels<'a>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// Destination side of a conversion.
pub(crate) struct ViewMut<'a> {
    pub pixels: PixelsMut<'a>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// Storage index of logical channel `c` (0 = R, 1 = G, 2 = B, 3 = A).
#[inline]
fn channel_slot(order: PixelOrder, c: usize) -> Option<usize> {
    match (order, c) {
        (PixelOrder::Rgba, _) => Some(c),
        (PixelOrder::Bgr, 0) => Some(2),
        (PixelOrder::Bgr, 1) => Some(1),
        (PixelOrder::Bgr, 2) => Some(0),
        (PixelOrder::Bgr, _) => None,
    }
}

#[inline]
fn offset(layout: ComponentLayout, pixel: usize, slot: usize, channels: usize, count: usize) -> usize {
    match layout {
        ComponentLayout::Interleaved => pixel * channels + slot,
        ComponentLayout::Planar => slot * count + pixel,
    }
}

fn decode(src: &View<'_>, scale: f32) -> Vec<[f32; 4]> {
    let count = src.width as usize * src.height as usize;
    let channels = src.format.channels() as usize;
    let PixelFormat { order, layout, .. } = src.format;

    (0..count)
        .into_par_iter()
        .map(|pixel| {
            let mut rgba = [0.0, 0.0, 0.0, 1.0];
            for (c, value) in rgba.iter_mut().enumerate() {
                let Some(slot) = channel_slot(order, c) else {
                    continue;
                };
                let idx = offset(layout, pixel, slot, channels, count);
                *value = match src.pixels {
                    Pixels::U8(data) => data[idx] as f32 / 255.0,
                    Pixels::F32(data) => data[idx],
                } * scale;
            }
            rgba
        })
        .collect()
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn encode(rgba: &[[f32; 4]], dst: &mut ViewMut<'_>) {
    let count = rgba.len();
    let channels = dst.format.channels() as usize;
    let order = dst.format.order;

    match (dst.format.layout, &mut dst.pixels) {
        (ComponentLayout::Interleaved, PixelsMut::U8(data)) => {
            data.par_chunks_mut(channels)
                .zip(rgba.par_iter())
                .for_each(|(out, px)| {
                    for c in 0..4 {
                        if let Some(slot) = channel_slot(order, c) {
                            out[slot] = to_u8(px[c]);
                        }
                    }
                });
        }
        (ComponentLayout::Interleaved, PixelsMut::F32(data)) => {
            data.par_chunks_mut(channels)
                .zip(rgba.par_iter())
                .for_each(|(out, px)| {
                    for c in 0..4 {
                        if let Some(slot) = channel_slot(order, c) {
                            out[slot] = px[c];
                        }
                    }
                });
        }
        (ComponentLayout::Planar, PixelsMut::U8(data)) => {
            for c in 0..4 {
                let Some(slot) = channel_slot(order, c) else {
                    continue;
                };
                data[slot * count..(slot + 1) * count]
                    .par_iter_mut()
                    .zip(rgba.par_iter())
                    .for_each(|(out, px)| *out = to_u8(px[c]));
            }
        }
        (ComponentLayout::Planar, PixelsMut::F32(data)) => {
            for c in 0..4 {
                let Some(slot) = channel_slot(order, c) else {
                    continue;
                };
                data[slot * count..(slot + 1) * count]
                    .par_iter_mut()
                    .zip(rgba.par_iter())
                    .for_each(|(out, px)| *out = px[c]);
            }
        }
    }
}

fn expected_len(format: PixelFormat, width: u32, height: u32) -> usize {
    format.component_count(width, height)
}

/// Converts `src` into `dst`'s format.
pub(crate) fn convert(src: &View<'_>, dst: &mut ViewMut<'_>, scale: f32) -> ComputeResult<()> {
    if (src.width, src.height) != (dst.width, dst.height) {
        return Err(ComputeError::DimensionMismatch {
            from: (src.width, src.height),
            to: (dst.width, dst.height),
        });
    }

    let src_len = match src.pixels {
        Pixels::U8(d) => d.len(),
        Pixels::F32(d) => d.len(),
    };
    let expected = expected_len(src.format, src.width, src.height);
    if src_len != expected {
        return Err(ComputeError::BufferSizeMismatch { expected, actual: src_len });
    }
    let dst_len = match &dst.pixels {
        PixelsMut::U8(d) => d.len(),
        PixelsMut::F32(d) => d.len(),
    };
    let expected = expected_len(dst.format, dst.width, dst.height);
    if dst_len != expected {
        return Err(ComputeError::BufferSizeMismatch { expected, actual: dst_len });
    }

    let rgba = decode(src, scale);
    encode(&rgba, dst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rgba8_to_bgr_planar() {
        // 2x1: red, blue
        let src_data = [255u8, 0, 0, 255, 0, 0, 255, 128];
        let src = View {
            pixels: Pixels::U8(&src_data),
            format: PixelFormat::RGBA8_INTERLEAVED,
            width: 2,
            height: 1,
        };
        let mut dst_data = vec![0.0f32; 6];
        let mut dst = ViewMut {
            pixels: PixelsMut::F32(&mut dst_data),
            format: PixelFormat::BGR_F32_PLANAR,
            width: 2,
            height: 1,
        };
        convert(&src, &mut dst, 1.0).unwrap();
        // planes: B, G, R
        assert_eq!(dst_data, vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bgr_to_rgba8_sets_opaque_alpha() {
        let src_data = [0.5f32, 0.25, 1.0];
        let src = View {
            pixels: Pixels::F32(&src_data),
            format: PixelFormat::BGR_F32_PLANAR,
            width: 1,
            height: 1,
        };
        let mut dst_data = vec![0u8; 4];
        let mut dst = ViewMut {
            pixels: PixelsMut::U8(&mut dst_data),
            format: PixelFormat::RGBA8_INTERLEAVED,
            width: 1,
            height: 1,
        };
        convert(&src, &mut dst, 1.0).unwrap();
        assert_eq!(dst_data, vec![255, 64, 128, 255]);
    }

    #[test]
    fn test_scale_applies() {
        let src_data = [51u8, 102, 0, 255];
        let src = View {
            pixels: Pixels::U8(&src_data),
            format: PixelFormat::RGBA8_INTERLEAVED,
            width: 1,
            height: 1,
        };
        let mut dst_data = vec![0.0f32; 4];
        let mut dst = ViewMut {
            pixels: PixelsMut::F32(&mut dst_data),
            format: PixelFormat::RGBA_F32_PLANAR,
            width: 1,
            height: 1,
        };
        convert(&src, &mut dst, 2.0).unwrap();
        assert_relative_eq!(dst_data[0], 0.4, epsilon = 1e-6);
        assert_relative_eq!(dst_data[1], 0.8, epsilon = 1e-6);
        assert_relative_eq!(dst_data[3], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let src_data = [0u8; 4];
        let src = View {
            pixels: Pixels::U8(&src_data),
            format: PixelFormat::RGBA8_INTERLEAVED,
            width: 1,
            height: 1,
        };
        let mut dst_data = vec![0.0f32; 6];
        let mut dst = ViewMut {
            pixels: PixelsMut::F32(&mut dst_data),
            format: PixelFormat::BGR_F32_PLANAR,
            width: 2,
            height: 1,
        };
        assert!(matches!(
            convert(&src, &mut dst, 1.0),
            Err(ComputeError::DimensionMismatch { .. })
        ));
    }
}
