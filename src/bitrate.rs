//! Bitrate model — map an output resolution and quality tier to a target
//! bitrate.
//!
//! The model is a lookup against a fixed table of reference bitrates (one per
//! common output height), scaled by a subjective quality weight. It is pure
//! and deterministic: calling it any number of times with the same inputs
//! yields the same output, with no side effects.
//!
//! # Example
//!
//! ```
//! use recompress::{QualityLevel, compute_bitrate};
//!
//! // 1080p at the balanced quality tier.
//! assert_eq!(compute_bitrate(1080, QualityLevel::new(3), None), 5_100_000);
//! ```

/// Reference bitrates in Mbit/s, keyed by output height in pixels.
///
/// Entries are sorted ascending by height and fixed at build time.
const REFERENCE_BITRATES: [(u32, f64); 7] = [
    (360, 0.96),
    (480, 1.3),
    (720, 2.6),
    (1080, 5.1),
    (1440, 9.8),
    (2160, 21.4),
    (4320, 48.9),
];

/// A subjective quality tier, 1 (smallest file) through 5 (best quality).
///
/// Each level maps to a multiplicative weight applied to the reference
/// bitrate for the output resolution. Values outside `1..=5` fall back to
/// the neutral weight of level 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QualityLevel(i32);

impl QualityLevel {
    /// Create a quality level from a raw integer.
    pub fn new(level: i32) -> Self {
        Self(level)
    }

    /// The raw level as given by the caller.
    pub fn level(self) -> i32 {
        self.0
    }

    /// The multiplicative weight applied to the reference bitrate.
    pub fn weight(self) -> f64 {
        match self.0 {
            1 => 0.5,
            2 => 0.75,
            3 => 1.0,
            4 => 1.5,
            5 => 2.0,
            _ => 1.0,
        }
    }
}

impl Default for QualityLevel {
    /// The neutral tier (level 3, weight 1.0).
    fn default() -> Self {
        Self(3)
    }
}

/// Find the smallest reference height that is >= the requested height.
///
/// Requests above the largest table entry resolve to that largest entry;
/// the table is a deliberate conservative cap, never extrapolated.
fn nearest_reference(height: u32) -> (u32, f64) {
    for &(reference_height, mbits) in &REFERENCE_BITRATES {
        if height <= reference_height {
            return (reference_height, mbits);
        }
    }
    REFERENCE_BITRATES[REFERENCE_BITRATES.len() - 1]
}

/// Compute the target video bitrate in bits per second.
///
/// `output_short_edge` is the shorter dimension of the output frame in
/// pixels. The matched reference bitrate is multiplied by the quality
/// weight and converted to bits/second; when `max_bitrate` is supplied the
/// result is clamped to it.
pub fn compute_bitrate(
    output_short_edge: u32,
    quality: QualityLevel,
    max_bitrate: Option<u64>,
) -> u64 {
    let (reference_height, reference_mbits) = nearest_reference(output_short_edge);
    let bitrate = (reference_mbits * quality.weight() * 1_000_000.0) as u64;

    log::debug!(
        "Bitrate model: short_edge={output_short_edge} -> reference {reference_height}p \
         ({reference_mbits} Mbit/s) x {} = {bitrate} bit/s",
        quality.weight(),
    );

    match max_bitrate {
        Some(cap) => bitrate.min(cap),
        None => bitrate,
    }
}
