//! Internal timestamp conversion helpers.
//!
//! Shared logic for moving between FFmpeg stream timestamps and
//! [`Duration`] values that does not belong in any single public module.

use std::time::Duration;

use ffmpeg_next::Rational;

/// Rescale a PTS value from a stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value from a stream time base to a [`Duration`].
///
/// Negative timestamps (pre-roll samples) clamp to zero.
pub(crate) fn pts_to_duration(pts: i64, time_base: Rational) -> Duration {
    Duration::from_secs_f64(pts_to_seconds(pts, time_base).max(0.0))
}

/// Convert a [`Duration`] to a timestamp in the given time base.
pub(crate) fn duration_to_pts(duration: Duration, time_base: Rational) -> i64 {
    let seconds = duration.as_secs_f64();
    let numerator = time_base.numerator() as f64;
    let denominator = time_base.denominator() as f64;
    (seconds * denominator / numerator) as i64
}
