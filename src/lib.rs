//! # recompress
//!
//! Re-encode media files into smaller MP4 containers — pick a quality level
//! and an optional resolution target, and let the pipeline derive the
//! encoder settings.
//!
//! `recompress` provides a clean, ergonomic API for shrinking video files:
//! it demuxes and decodes the input's best video and audio tracks, scales
//! video down to a target resolution (never up), chooses a bitrate from the
//! output's short edge and a quality weight, re-encodes both tracks, and
//! muxes them into a fresh MP4, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use recompress::{
//!     EncodeOptions, MediaSource, NoOpProgress, OutputContainer, QualityLevel,
//!     ResolutionPreset, TranscodeSession,
//! };
//!
//! let input = MediaSource::open("movie.mp4")?;
//! let options = EncodeOptions::new()
//!     .quality(QualityLevel::new(3))
//!     .resolution(ResolutionPreset::Hd720.target());
//!
//! let session = TranscodeSession::new(input, options, "movie-small.mp4");
//! let output = session.run::<OutputContainer>(Arc::new(NoOpProgress))?;
//! println!("wrote {}", output.display());
//! # Ok::<(), recompress::RecompressError>(())
//! ```
//!
//! ### Progress and Cancellation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use recompress::{
//!     EncodeOptions, MediaSource, OutputContainer, ProgressCallback, TranscodeSession,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, fraction: f32) {
//!         println!("{:.0}%", fraction * 100.0);
//!     }
//! }
//!
//! let input = MediaSource::open("movie.mp4")?;
//! let session = TranscodeSession::new(input, EncodeOptions::new(), "out.mp4");
//!
//! // Cancel from another thread at any point before finalization.
//! let token = session.cancellation_token();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(30));
//!     token.cancel();
//! });
//!
//! let result = session.run::<OutputContainer>(Arc::new(PrintProgress));
//! # drop(result);
//! # Ok::<(), recompress::RecompressError>(())
//! ```
//!
//! ## Features
//!
//! - **Quality levels** — one knob from 1 (smallest) to 5 (largest), mapped
//!   to bitrate multipliers
//! - **Resolution targets** — long-edge or short-edge caps with aspect
//!   ratio preservation; sources below the target pass through unscaled
//! - **Bitrate policy** — derived from the output's short edge against a
//!   reference ladder (360p through 8K), with an optional hard cap
//! - **H.264 and HEVC** video; audio is normalized to stereo 44.1 kHz AAC
//!   at 128 kbit/s
//! - **Progress & cancellation** — throttled monotonic callbacks and a
//!   cooperative [`CancellationToken`]
//! - **Clean failure** — a failed or cancelled session deletes its partial
//!   output; only completed sessions leave an artifact
//! - **Metadata carry-over** — container tags and display rotation travel
//!   from input to output
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod bitrate;
mod conversion;
pub mod demux;
pub mod error;
pub mod ffmpeg;
pub mod mux;
pub mod progress;
pub mod resolution;
pub mod session;
pub mod settings;
pub mod track;

pub use bitrate::{QualityLevel, compute_bitrate};
pub use demux::{DecodedTrackSource, MediaSource};
pub use error::RecompressError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use mux::{AudioEncodeSink, EncodeSink, OutputContainer, VideoEncodeSink};
pub use progress::{CancellationToken, NoOpProgress, ProgressCallback, ProgressGate};
pub use resolution::{ResolutionPreset, ResolutionTarget, compute_output_size};
pub use session::{SessionState, TranscodeSession};
pub use settings::{AudioEncodeParameters, EncodeOptions, EncodeParameters, VideoCodec};
pub use track::{
    AudioTrackInfo, MediaInput, MediaKind, MediaOutput, Sample, SampleData, TrackSink,
    TrackSource, VideoTrackInfo,
};
