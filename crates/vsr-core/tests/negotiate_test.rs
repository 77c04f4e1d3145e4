//! Negotiation tests for vsr-core.

use approx::assert_relative_eq;
use vsr_core::{
    ScaleNegotiator, Size, SUPPORTED_SCALES, bounds_for_scale, negotiate, snap_scale,
};

#[test]
fn test_full_hd_at_one_and_a_half() {
    let n = negotiate(Size::new(1920, 1080), 1.5);
    assert_eq!(n.scale, 1.5);
    assert_eq!(n.input, Size::new(1920, 1080));
    assert_eq!(n.output, Size::new(2880, 1620));
    assert!(n.uniform);
}

#[test]
fn test_below_floor_clamps_both_axes() {
    let n = negotiate(Size::new(100, 50), 2.0);
    assert_eq!(n.scale, 2.0);
    // 160 * 50/100 = 80, raised to the 90 floor
    assert_eq!(n.input, Size::new(160, 90));
    assert_eq!(n.output, Size::new(320, 180));
}

#[test]
fn test_out_of_range_scale_snaps_to_smallest() {
    assert_relative_eq!(snap_scale(0.5), 4.0 / 3.0);

    // multiples of 3 keep 4/3 uniform
    let n = negotiate(Size::new(1920, 1080), 0.5);
    assert_relative_eq!(n.scale, 4.0 / 3.0);
    assert_eq!(n.output, Size::new(2560, 1440));
}

#[test]
fn test_snapped_scale_is_nearest_member() {
    let mut s = 1.0f32;
    while s <= 4.0 {
        let snapped = snap_scale(s);
        assert!(SUPPORTED_SCALES.contains(&snapped));
        let best = SUPPORTED_SCALES
            .iter()
            .map(|m| (m - s).abs())
            .fold(f32::MAX, f32::min);
        assert_relative_eq!((snapped - s).abs(), best);
        s += 0.05;
    }
}

#[test]
fn test_accepted_scale_never_below_requested() {
    for &(w, h) in &[(161, 91), (1919, 1079), (333, 777), (7, 3), (4096, 2160)] {
        for &scale in &SUPPORTED_SCALES {
            let n = negotiate(Size::new(w, h), scale);
            assert!(SUPPORTED_SCALES.contains(&n.scale));
            assert!(n.scale >= n.requested);
        }
    }
}

#[test]
fn test_input_within_bounds() {
    for &(w, h) in &[(1, 1), (100, 50), (50, 100), (8000, 100), (100, 8000), (3840, 2160)] {
        for &scale in &SUPPORTED_SCALES {
            let n = negotiate(Size::new(w, h), scale);
            let b = bounds_for_scale(n.scale);
            assert!(n.input.width >= b.min.width && n.input.width <= b.max.width);
            assert!(n.input.height >= b.min.height && n.input.height <= b.max.height);
        }
    }
}

#[test]
fn test_landscape_dominant_width() {
    let frame = Size::new(1280, 600);
    let n = negotiate(frame, 2.0);
    let b = bounds_for_scale(n.scale);
    assert_eq!(n.input.width, frame.width.clamp(b.min.width, b.max.width));
    let derived = (n.input.width as f64 * 600.0 / 1280.0).round() as u32;
    assert_eq!(n.input.height, derived.clamp(b.min.height, b.max.height));
}

#[test]
fn test_square_frame_follows_height() {
    let n = negotiate(Size::new(2000, 2000), 1.5);
    assert_eq!(n.input, Size::new(1080, 1080));
    assert_eq!(n.output, Size::new(1620, 1620));

    let n = negotiate(Size::new(100, 100), 2.0);
    assert_eq!(n.input, Size::new(160, 90));
    assert_eq!(n.output, Size::new(320, 180));
}

#[test]
fn test_near_square_takes_width_branch() {
    let n = negotiate(Size::new(2001, 2000), 1.5);
    assert_eq!(n.input.width, 1920);
    assert_eq!(n.input.height, 1080);
}

#[test]
fn test_output_matches_rounded_product_when_uniform() {
    for &(w, h) in &[(640, 360), (1280, 720), (800, 600), (960, 540)] {
        for &scale in &SUPPORTED_SCALES {
            let n = negotiate(Size::new(w, h), scale);
            if n.uniform {
                assert_eq!(n.output, n.input.scaled(n.scale));
            }
        }
    }
}

#[test]
fn test_largest_scale_is_always_uniform() {
    // integer multiples at 4x are exact, so the search always terminates uniform
    for &(w, h) in &[(3, 1), (961, 541), (1, 4000)] {
        let n = negotiate(Size::new(w, h), 4.0);
        assert_eq!(n.scale, 4.0);
        assert_eq!(n.output, n.input.scaled(4.0));
        assert!(n.uniform);
    }
}

#[test]
fn test_resolve_is_idempotent() {
    let mut neg = ScaleNegotiator::new();
    let first = neg.resolve(Size::new(1000, 700), 3.0);
    let second = neg.resolve(Size::new(1000, 700), 3.0);
    assert_eq!(first, second);
    assert_eq!(neg.misses(), 1);
    assert_eq!(neg.hits(), 1);
    assert_eq!(neg.last(), Some(&first));
}
