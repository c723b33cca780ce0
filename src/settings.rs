//! Encode settings — the caller-facing options for one transcode session
//! and the concrete parameters derived from them.
//!
//! [`EncodeOptions`] is what the caller configures (quality, codec,
//! resolution, optional bitrate cap). [`EncodeParameters`] is computed from
//! those options plus the source track's geometry, exactly once per
//! session, by [`EncodeParameters::derive`].
//!
//! # Example
//!
//! ```
//! use recompress::{EncodeOptions, EncodeParameters, QualityLevel, ResolutionPreset, VideoCodec};
//!
//! let options = EncodeOptions::new()
//!     .quality(QualityLevel::new(3))
//!     .codec(VideoCodec::H264)
//!     .resolution(ResolutionPreset::Hd720.target());
//!
//! let params = EncodeParameters::derive(3840, 2160, &options).unwrap();
//! assert_eq!((params.width, params.height), (1280, 720));
//! assert_eq!(params.bitrate, 2_600_000);
//! ```

use ffmpeg_next::codec::Id;

use crate::bitrate::{QualityLevel, compute_bitrate};
use crate::error::RecompressError;
use crate::resolution::{ResolutionTarget, compute_output_size};

/// Supported output video codecs.
///
/// H.264 is the widely compatible choice; HEVC trades compatibility for
/// better compression at the same bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    Hevc,
}

impl VideoCodec {
    pub(crate) fn codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::Hevc => Id::HEVC,
        }
    }
}

/// Caller-facing options for one transcode session.
///
/// Selected before the session starts and immutable for its duration.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Subjective quality tier, 1..=5.
    pub quality: QualityLevel,
    /// Output video codec.
    pub codec: VideoCodec,
    /// Requested output resolution.
    pub resolution: ResolutionTarget,
    /// Optional hard cap on the computed video bitrate, in bits/second.
    pub max_bitrate: Option<u64>,
}

impl EncodeOptions {
    /// Create options with the defaults: quality 3, H.264, original
    /// resolution, no bitrate cap.
    pub fn new() -> Self {
        Self {
            quality: QualityLevel::default(),
            codec: VideoCodec::H264,
            resolution: ResolutionTarget::Original,
            max_bitrate: None,
        }
    }

    /// Set the quality tier.
    #[must_use]
    pub fn quality(mut self, quality: QualityLevel) -> Self {
        self.quality = quality;
        self
    }

    /// Set the output codec.
    #[must_use]
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the resolution target.
    #[must_use]
    pub fn resolution(mut self, resolution: ResolutionTarget) -> Self {
        self.resolution = resolution;
        self
    }

    /// Cap the computed video bitrate at `bits_per_second`.
    #[must_use]
    pub fn max_bitrate(mut self, bits_per_second: u64) -> Self {
        self.max_bitrate = Some(bits_per_second);
        self
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Concrete video encode parameters, derived once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParameters {
    /// Output frame width in pixels.
    pub width: u32,
    /// Output frame height in pixels.
    pub height: u32,
    /// Target video bitrate in bits/second.
    pub bitrate: u64,
    /// Output video codec.
    pub codec: VideoCodec,
}

impl EncodeParameters {
    /// Derive encode parameters from a source track's natural size and the
    /// caller's options: resolution policy first, then the bitrate model on
    /// the resulting short edge.
    ///
    /// # Errors
    ///
    /// Returns [`RecompressError::MissingTrackGeometry`] when the natural
    /// size is zero.
    pub fn derive(
        natural_width: u32,
        natural_height: u32,
        options: &EncodeOptions,
    ) -> Result<Self, RecompressError> {
        let (width, height) = compute_output_size(natural_width, natural_height, options.resolution)?;
        let short_edge = width.min(height);
        let bitrate = compute_bitrate(short_edge, options.quality, options.max_bitrate);

        Ok(Self {
            width,
            height,
            bitrate,
            codec: options.codec,
        })
    }
}

/// Fixed encode parameters for the audio track.
///
/// Audio is always re-encoded to the same target layout regardless of the
/// source: stereo AAC at 44.1 kHz and 128 kbit/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEncodeParameters {
    /// Number of output channels.
    pub channels: u16,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output bitrate in bits/second.
    pub bitrate: u64,
}

impl Default for AudioEncodeParameters {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44_100,
            bitrate: 128_000,
        }
    }
}
