//! Track abstractions — the seams between the transcode session and the
//! underlying demuxer/encoder.
//!
//! A [`TrackSource`] is a forward-only pull source of decoded samples for
//! one track; a [`TrackSink`] consumes encoded-and-muxed samples for one
//! track under an explicit backpressure contract. [`MediaInput`] and
//! [`MediaOutput`] are the container-level factories that hand out sources
//! and sinks. The crate ships FFmpeg-backed implementations
//! ([`MediaSource`](crate::MediaSource), [`OutputContainer`](crate::OutputContainer));
//! the session itself is written against these traits only, so alternative
//! backends (including scripted ones in tests) plug in unchanged.

use std::{collections::HashMap, path::Path, time::Duration};

use ffmpeg_next::frame::{Audio as AudioFrame, Video as VideoFrame};

use crate::error::RecompressError;
use crate::settings::{AudioEncodeParameters, EncodeParameters};

/// The media type of a track.
///
/// A session operates on at most one track of each kind; kinds absent from
/// the input are skipped, never invented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// The video track.
    Video,
    /// The audio track.
    Audio,
}

/// The decoded payload carried by one [`Sample`].
pub enum SampleData {
    /// A decoded video frame.
    VideoFrame(VideoFrame),
    /// A decoded audio frame.
    AudioFrame(AudioFrame),
    /// An opaque payload, for non-FFmpeg source/sink implementations.
    Raw(Vec<u8>),
}

impl std::fmt::Debug for SampleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleData::VideoFrame(_) => f.write_str("VideoFrame"),
            SampleData::AudioFrame(_) => f.write_str("AudioFrame"),
            SampleData::Raw(bytes) => write!(f, "Raw({} bytes)", bytes.len()),
        }
    }
}

/// One timestamped decoded sample pulled from a [`TrackSource`].
#[derive(Debug)]
pub struct Sample {
    /// Presentation timestamp, measured from the start of the stream.
    pub pts: Duration,
    /// The decoded payload.
    pub data: SampleData,
}

/// Natural properties of the input's video track.
#[derive(Debug, Clone)]
pub struct VideoTrackInfo {
    /// Natural frame width in pixels.
    pub width: u32,
    /// Natural frame height in pixels.
    pub height: u32,
    /// Average frame rate, frames per second (0.0 when unknown).
    pub frame_rate: f64,
    /// Display rotation in degrees, when the container declares one.
    pub rotation: Option<i32>,
    /// Container-level metadata tags, carried through to the output.
    pub tags: HashMap<String, String>,
}

/// Natural properties of the input's audio track.
#[derive(Debug, Clone)]
pub struct AudioTrackInfo {
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// A per-track ordered pull source of decoded samples.
///
/// Sources are lazy, finite, and forward-only: the underlying demuxer is a
/// single-pass cursor, so a source cannot be restarted once samples have
/// been pulled.
pub trait TrackSource {
    /// Pull the next sample in presentation order.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// [`RecompressError::DemuxError`] when the container or track data
    /// cannot be read or decoded.
    fn next_sample(&mut self) -> Result<Option<Sample>, RecompressError>;

    /// Release demuxer resources.
    ///
    /// Calling this while samples remain pending is legal and abandons the
    /// remainder of the stream.
    fn close(&mut self);
}

/// A per-track consumer of samples with an explicit backpressure contract.
///
/// Callers must check [`is_ready_for_more_input`](Self::is_ready_for_more_input)
/// before every [`submit`](Self::submit); submitting while not ready is a
/// contract violation reported as [`RecompressError::WriterNotReady`].
pub trait TrackSink {
    /// Whether the sink can accept another sample right now.
    fn is_ready_for_more_input(&self) -> bool;

    /// Submit one sample for encoding.
    ///
    /// # Errors
    ///
    /// [`RecompressError::EncodeError`] when the encoder rejects the
    /// sample, or [`RecompressError::WriterNotReady`] on a contract
    /// violation.
    fn submit(&mut self, sample: Sample) -> Result<(), RecompressError>;

    /// Signal that no further input will be submitted.
    ///
    /// The sink drains toward completion at its own pace; `submit` is not
    /// permitted afterwards.
    ///
    /// # Errors
    ///
    /// [`RecompressError::EncodeError`] when flushing the encoder fails.
    fn mark_finished(&mut self) -> Result<(), RecompressError>;
}

/// Container-level input: track enumeration plus per-track source factory.
pub trait MediaInput {
    /// The source type handed to the session's track loops.
    type Source: TrackSource + Send + 'static;

    /// Properties of the video track, if one exists.
    fn video_info(&self) -> Option<&VideoTrackInfo>;

    /// Properties of the audio track, if one exists.
    fn audio_info(&self) -> Option<&AudioTrackInfo>;

    /// Container duration, used as the denominator for progress.
    fn duration(&self) -> Duration;

    /// Open the pull source for one track.
    ///
    /// # Errors
    ///
    /// [`RecompressError::DemuxError`] when the requested track is absent
    /// or its decoder cannot be created.
    fn open_source(&mut self, kind: MediaKind) -> Result<Self::Source, RecompressError>;
}

/// Container-level output: sink factory plus start/finalize lifecycle.
///
/// The session calls [`create`](Self::create), opens one sink per present
/// media kind, then [`start`](Self::start); once every sink has been marked
/// finished and its loop has completed, [`finalize`](Self::finalize)
/// commits the container. Dropping an output without finalizing abandons
/// it (the session deletes the file afterwards).
pub trait MediaOutput: Sized {
    /// The sink type handed to the session's track loops.
    type Sink: TrackSink + Send + 'static;

    /// Create the output container at `path`, replacing nothing — the
    /// session has already deleted any stale artifact.
    ///
    /// # Errors
    ///
    /// [`RecompressError::EncodeError`] when the container cannot be
    /// created.
    fn create(path: &Path) -> Result<Self, RecompressError>;

    /// Open the video sink with the derived encode parameters, tagging the
    /// output with the source track's rotation and container metadata.
    ///
    /// # Errors
    ///
    /// [`RecompressError::EncodeError`] when the codec/bitrate combination
    /// is rejected.
    fn open_video_sink(
        &mut self,
        parameters: &EncodeParameters,
        info: &VideoTrackInfo,
    ) -> Result<Self::Sink, RecompressError>;

    /// Open the audio sink with the fixed target layout.
    ///
    /// # Errors
    ///
    /// [`RecompressError::EncodeError`] when the encoder cannot be opened.
    fn open_audio_sink(
        &mut self,
        parameters: &AudioEncodeParameters,
    ) -> Result<Self::Sink, RecompressError>;

    /// Start the container (write header structures). Called exactly once,
    /// after all sinks are open and before any sample is submitted.
    ///
    /// # Errors
    ///
    /// [`RecompressError::EncodeError`] when the header cannot be written.
    fn start(&mut self) -> Result<(), RecompressError>;

    /// Commit the container (flush trailer/index structures).
    ///
    /// # Errors
    ///
    /// [`RecompressError::FinalizeError`] with the writer's diagnostic when
    /// the commit fails.
    fn finalize(self) -> Result<(), RecompressError>;
}
