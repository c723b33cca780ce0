//! Error types for the `recompress` crate.
//!
//! This module defines [`RecompressError`], the unified error type returned by
//! all fallible operations in the crate. Variants carry enough context to
//! diagnose a failed session without additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

use crate::track::MediaKind;

/// The unified error type for all `recompress` operations.
///
/// Every public method that can fail returns `Result<T, RecompressError>`.
/// A transcode session reports exactly one of these through its terminal
/// result; per-sample problems are never surfaced individually.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecompressError {
    /// The input container could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The video track's natural size or duration could not be read.
    ///
    /// Raised during session preparation, before any output is written: a
    /// bitrate cannot be computed for a track with unknown geometry.
    #[error("Video track geometry is missing or zero ({detail})")]
    MissingTrackGeometry {
        /// What exactly was unreadable (e.g. `width=0`).
        detail: String,
    },

    /// The container could not be parsed or a requested track is absent.
    #[error("Demux error: {0}")]
    DemuxError(String),

    /// The encoder rejected its configuration or a submitted sample.
    ///
    /// Fails the whole session, not just the offending track.
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// A sample was submitted to a sink that was not ready for input.
    ///
    /// This is a programming-contract violation, not a user-facing
    /// condition: the session's pull loop checks readiness before every
    /// submit, so a correctly driven sink never reports it.
    #[error("{0:?} writer was not ready for more input")]
    WriterNotReady(MediaKind),

    /// Committing the output container (trailer/index) failed.
    #[error("Failed to finalize output container: {0}")]
    FinalizeError(String),

    /// The session was cancelled via its
    /// [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred while managing the output artifact.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<FfmpegError> for RecompressError {
    fn from(error: FfmpegError) -> Self {
        RecompressError::DemuxError(error.to_string())
    }
}
