//! Resolution policy tests: aspect preservation, no upscaling, presets.

use proptest::prelude::*;
use recompress::{
    RecompressError, ResolutionPreset, ResolutionTarget, compute_output_size,
};

// ── Downscaling ────────────────────────────────────────────────────

#[test]
fn short_edge_downscale_landscape() {
    let (width, height) =
        compute_output_size(3840, 2160, ResolutionTarget::ShortEdge(720)).unwrap();
    assert_eq!((width, height), (1280, 720));
}

#[test]
fn short_edge_downscale_portrait() {
    // Portrait footage: the short edge is the width.
    let (width, height) =
        compute_output_size(2160, 3840, ResolutionTarget::ShortEdge(720)).unwrap();
    assert_eq!((width, height), (720, 1280));
}

#[test]
fn long_edge_downscale() {
    let (width, height) =
        compute_output_size(3840, 2160, ResolutionTarget::LongEdge(1920)).unwrap();
    assert_eq!((width, height), (1920, 1080));
}

#[test]
fn odd_aspect_ratio_rounds_to_whole_pixels() {
    // 1000x333 at short edge 100 scales by 100/333.
    let (width, height) =
        compute_output_size(1000, 333, ResolutionTarget::ShortEdge(100)).unwrap();
    assert_eq!(height, 100);
    assert_eq!(width, 300); // 1000 * 100/333 = 300.3 -> 300
}

// ── Never upscale ──────────────────────────────────────────────────

#[test]
fn target_above_source_keeps_original_size() {
    let (width, height) =
        compute_output_size(1280, 720, ResolutionTarget::ShortEdge(1080)).unwrap();
    assert_eq!((width, height), (1280, 720));
}

#[test]
fn target_equal_to_source_keeps_original_size() {
    let (width, height) =
        compute_output_size(1280, 720, ResolutionTarget::ShortEdge(720)).unwrap();
    assert_eq!((width, height), (1280, 720));
}

#[test]
fn original_target_is_identity() {
    let (width, height) = compute_output_size(1918, 1078, ResolutionTarget::Original).unwrap();
    assert_eq!((width, height), (1918, 1078));
}

// ── Degenerate inputs ──────────────────────────────────────────────

#[test]
fn zero_width_is_rejected() {
    let result = compute_output_size(0, 1080, ResolutionTarget::ShortEdge(720));
    assert!(matches!(
        result,
        Err(RecompressError::MissingTrackGeometry { .. })
    ));
}

#[test]
fn zero_height_is_rejected() {
    let result = compute_output_size(1920, 0, ResolutionTarget::Original);
    assert!(matches!(
        result,
        Err(RecompressError::MissingTrackGeometry { .. })
    ));
}

#[test]
fn extreme_aspect_ratio_never_collapses_to_zero() {
    // 10000x10 at short edge 1: the long edge stays >= 1 pixel.
    let (width, height) = compute_output_size(10_000, 10, ResolutionTarget::ShortEdge(1)).unwrap();
    assert!(width >= 1);
    assert_eq!(height, 1);
}

// ── Presets ────────────────────────────────────────────────────────

#[test]
fn presets_resolve_to_documented_targets() {
    assert_eq!(
        ResolutionPreset::Uhd4K.target(),
        ResolutionTarget::LongEdge(3840)
    );
    assert_eq!(
        ResolutionPreset::Qhd2K.target(),
        ResolutionTarget::LongEdge(2560)
    );
    assert_eq!(
        ResolutionPreset::Hd1080.target(),
        ResolutionTarget::ShortEdge(1080)
    );
    assert_eq!(
        ResolutionPreset::Hd720.target(),
        ResolutionTarget::ShortEdge(720)
    );
    assert_eq!(
        ResolutionPreset::Sd540.target(),
        ResolutionTarget::ShortEdge(540)
    );
    assert_eq!(
        ResolutionPreset::Sd480.target(),
        ResolutionTarget::ShortEdge(480)
    );
    assert_eq!(
        ResolutionPreset::Sd360.target(),
        ResolutionTarget::ShortEdge(360)
    );
    assert_eq!(ResolutionPreset::Original.target(), ResolutionTarget::Original);
}

// ── Properties ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn output_never_exceeds_input(
        width in 1u32..8192,
        height in 1u32..8192,
        limit in 1u32..4320,
    ) {
        let (out_w, out_h) =
            compute_output_size(width, height, ResolutionTarget::ShortEdge(limit)).unwrap();
        prop_assert!(out_w <= width);
        prop_assert!(out_h <= height);
    }

    #[test]
    fn short_edge_limit_is_honored(
        width in 16u32..8192,
        height in 16u32..8192,
        limit in 16u32..4320,
    ) {
        let (out_w, out_h) =
            compute_output_size(width, height, ResolutionTarget::ShortEdge(limit)).unwrap();
        let out_short = out_w.min(out_h);
        let in_short = width.min(height);
        // Rounding may add a fraction of a pixel, never more.
        prop_assert!(out_short <= limit.min(in_short) + 1);
    }

    #[test]
    fn aspect_ratio_is_roughly_preserved(
        width in 64u32..8192,
        height in 64u32..8192,
        limit in 64u32..4320,
    ) {
        let (out_w, out_h) =
            compute_output_size(width, height, ResolutionTarget::LongEdge(limit)).unwrap();
        let input_ratio = width as f64 / height as f64;
        let output_ratio = out_w as f64 / out_h as f64;
        // Within rounding tolerance at small output sizes.
        prop_assert!((input_ratio - output_ratio).abs() / input_ratio < 0.05);
    }

    #[test]
    fn scaling_is_uniform_across_targets(
        width in 1u32..8192,
        height in 1u32..8192,
    ) {
        // ShortEdge and LongEdge agree whenever they imply the same scale.
        let short = width.min(height);
        let long = width.max(height);
        let via_short =
            compute_output_size(width, height, ResolutionTarget::ShortEdge(short)).unwrap();
        let via_long =
            compute_output_size(width, height, ResolutionTarget::LongEdge(long)).unwrap();
        prop_assert_eq!(via_short, (width, height));
        prop_assert_eq!(via_long, (width, height));
    }
}
