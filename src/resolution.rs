//! Resolution policy — map a requested resolution target to concrete output
//! pixel dimensions.
//!
//! The policy preserves the source aspect ratio, scales both edges
//! uniformly, and never upscales: a target larger than the source leaves
//! the frame untouched.
//!
//! # Example
//!
//! ```
//! use recompress::{ResolutionTarget, compute_output_size};
//!
//! // Downscale a 4K landscape frame so its short edge is 720 px.
//! let (width, height) =
//!     compute_output_size(3840, 2160, ResolutionTarget::ShortEdge(720)).unwrap();
//! assert_eq!((width, height), (1280, 720));
//! ```

use crate::error::RecompressError;

/// The requested output resolution for one session.
///
/// A numeric target is always positive; [`Original`](Self::Original)
/// carries no value. Selected before a session starts and immutable for
/// its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTarget {
    /// Scale so the larger frame edge is at most this many pixels.
    LongEdge(u32),
    /// Scale so the smaller frame edge is at most this many pixels.
    ShortEdge(u32),
    /// Keep the source dimensions unscaled.
    Original,
}

/// Named resolution presets, as offered to the user.
///
/// Each preset resolves to a long-edge or short-edge numeric target; the
/// large presets bound the long edge so that both portrait and landscape
/// footage land on the familiar format name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolutionPreset {
    /// 4K / UHD (long edge 3840).
    Uhd4K,
    /// 2K / QHD-class (long edge 2560).
    Qhd2K,
    /// 1080p (short edge 1080).
    Hd1080,
    /// 720p (short edge 720).
    Hd720,
    /// 540p (short edge 540).
    Sd540,
    /// 480p (short edge 480).
    Sd480,
    /// 360p (short edge 360).
    Sd360,
    /// Keep the original resolution.
    Original,
}

impl ResolutionPreset {
    /// The concrete target this preset resolves to.
    pub fn target(self) -> ResolutionTarget {
        match self {
            ResolutionPreset::Uhd4K => ResolutionTarget::LongEdge(3840),
            ResolutionPreset::Qhd2K => ResolutionTarget::LongEdge(2560),
            ResolutionPreset::Hd1080 => ResolutionTarget::ShortEdge(1080),
            ResolutionPreset::Hd720 => ResolutionTarget::ShortEdge(720),
            ResolutionPreset::Sd540 => ResolutionTarget::ShortEdge(540),
            ResolutionPreset::Sd480 => ResolutionTarget::ShortEdge(480),
            ResolutionPreset::Sd360 => ResolutionTarget::ShortEdge(360),
            ResolutionPreset::Original => ResolutionTarget::Original,
        }
    }
}

/// Compute the output frame dimensions for a resolution target.
///
/// Scaling uses floating point and the final dimensions are rounded to
/// whole pixels, with a floor of 1 so a valid input can never produce a
/// zero-sized frame.
///
/// # Errors
///
/// Returns [`RecompressError::MissingTrackGeometry`] when either natural
/// dimension is zero — the caller must not proceed to compute a bitrate or
/// open a writer for such a track.
pub fn compute_output_size(
    natural_width: u32,
    natural_height: u32,
    target: ResolutionTarget,
) -> Result<(u32, u32), RecompressError> {
    if natural_width == 0 || natural_height == 0 {
        return Err(RecompressError::MissingTrackGeometry {
            detail: format!("natural size {natural_width}x{natural_height}"),
        });
    }

    let long_edge = natural_width.max(natural_height) as f64;
    let short_edge = natural_width.min(natural_height) as f64;

    // Never upscale: the scale factor caps at 1.0.
    let scale = match target {
        ResolutionTarget::Original => 1.0,
        ResolutionTarget::LongEdge(limit) => (limit as f64 / long_edge).min(1.0),
        ResolutionTarget::ShortEdge(limit) => (limit as f64 / short_edge).min(1.0),
    };

    let width = ((natural_width as f64 * scale).round() as u32).max(1);
    let height = ((natural_height as f64 * scale).round() as u32).max(1);

    log::debug!(
        "Resolution policy: {natural_width}x{natural_height} with {target:?} -> {width}x{height}",
    );

    Ok((width, height))
}
