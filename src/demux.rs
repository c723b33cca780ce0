//! FFmpeg-backed input container.
//!
//! [`MediaSource`] opens a media file, caches the properties of its best
//! video and audio tracks, and hands out one [`DecodedTrackSource`] per
//! track. The underlying demuxer is a single-pass cursor shared by both
//! sources: each source pulls packets through a mutex-guarded
//! [`SharedDemuxer`], parking packets that belong to the sibling track in
//! its queue so neither loop loses data regardless of interleaving.
//!
//! # Example
//!
//! ```no_run
//! use recompress::{MediaInput, MediaSource};
//!
//! let source = MediaSource::open("input.mp4")?;
//! if let Some(video) = source.video_info() {
//!     println!("{}x{}, {:.2} fps", video.width, video.height, video.frame_rate);
//! }
//! println!("duration: {:?}", source.duration());
//! # Ok::<(), recompress::RecompressError>(())
//! ```

use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::{Parameters, context::Context as CodecContext},
    decoder::{Audio as AudioDecoder, Video as VideoDecoder},
    format::context::Input,
    frame::{Audio as AudioFrame, Video as VideoFrame},
    media::Type,
};

use crate::conversion::pts_to_duration;
use crate::error::RecompressError;
use crate::track::{
    AudioTrackInfo, MediaInput, MediaKind, Sample, SampleData, TrackSource, VideoTrackInfo,
};

/// Queued packets tolerated per sibling track before the reader backs off.
///
/// Without a cap, one stalled track would buffer the rest of the file in
/// memory while the other keeps pulling.
const QUEUE_LIMIT: usize = 256;

/// How long a track parks when the sibling's packet queue is at capacity.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(2);

/// Consecutive failed reads tolerated before the stream is declared broken.
const READ_ERROR_LIMIT: u32 = 64;

/// Per-track demuxer state captured at open time.
struct TrackBinding {
    stream_index: usize,
    time_base: Rational,
    parameters: Parameters,
}

/// The single-pass packet cursor shared by both track sources.
///
/// Packets read for a stream other than the requested one are queued for
/// that stream instead of being dropped, so the two pull loops can make
/// progress independently of the container's interleaving.
struct SharedDemuxer {
    input: Input,
    queues: HashMap<usize, VecDeque<Packet>>,
    eof: bool,
}

// The demuxer is only ever touched through the owning mutex, one thread at
// a time; the underlying AVFormatContext has no thread affinity.
unsafe impl Send for SharedDemuxer {}

/// Outcome of one packet poll against the shared demuxer.
enum PacketPoll {
    /// A packet for the requested stream.
    Ready(Packet),
    /// Reading further would overrun a stalled sibling's queue; back off
    /// and retry once that track has drained.
    Blocked,
    /// The read error budget is exhausted.
    Failed(FfmpegError),
    /// End of stream.
    End,
}

/// Whether any other tracked stream's queue is at capacity.
fn sibling_backlogged(queues: &HashMap<usize, VecDeque<Packet>>, stream_index: usize) -> bool {
    queues
        .iter()
        .any(|(index, queue)| *index != stream_index && queue.len() >= QUEUE_LIMIT)
}

/// Consecutive read failures, counted against [`READ_ERROR_LIMIT`].
struct ReadFailures(u32);

impl ReadFailures {
    fn new() -> Self {
        Self(0)
    }

    fn reset(&mut self) {
        self.0 = 0;
    }

    /// Record one failure; true when the budget is exhausted.
    fn record(&mut self) -> bool {
        self.0 += 1;
        self.0 >= READ_ERROR_LIMIT
    }
}

impl SharedDemuxer {
    /// Pull the next packet for `stream_index`, queueing packets that
    /// belong to other tracked streams.
    fn poll_packet(&mut self, stream_index: usize) -> PacketPoll {
        if let Some(packet) = self
            .queues
            .get_mut(&stream_index)
            .and_then(VecDeque::pop_front)
        {
            return PacketPoll::Ready(packet);
        }

        let mut failures = ReadFailures::new();
        while !self.eof {
            if sibling_backlogged(&self.queues, stream_index) {
                return PacketPoll::Blocked;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    failures.reset();
                    let packet_stream = packet.stream();
                    if packet_stream == stream_index {
                        return PacketPoll::Ready(packet);
                    }
                    if let Some(queue) = self.queues.get_mut(&packet_stream) {
                        queue.push_back(packet);
                    }
                    // Packets for untracked streams are dropped.
                }
                Err(FfmpegError::Eof) => {
                    self.eof = true;
                }
                Err(error) => {
                    // Transient read errors are retried, up to the budget.
                    if failures.record() {
                        return PacketPoll::Failed(error);
                    }
                }
            }
        }

        PacketPoll::End
    }
}

/// An opened input container, ready to hand out track sources.
///
/// The main entry point for the input side. Opening probes the best video
/// and audio streams and caches their natural properties; no decoding
/// happens until a source is pulled.
pub struct MediaSource {
    shared: Arc<Mutex<SharedDemuxer>>,
    video_binding: Option<TrackBinding>,
    audio_binding: Option<TrackBinding>,
    video_info: Option<VideoTrackInfo>,
    audio_info: Option<AudioTrackInfo>,
    duration: Duration,
    file_path: PathBuf,
}

impl MediaSource {
    /// Open a media file for transcoding.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, locates the best
    /// video and audio streams, and caches their metadata. Streams of any
    /// other kind are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RecompressError::FileOpen`] if the file cannot be opened
    /// or its codec parameters cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecompressError> {
        let file_path = path.as_ref().to_path_buf();

        log::debug!("Opening media source: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| RecompressError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&file_path).map_err(|error| {
            RecompressError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            }
        })?;

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        // Container-level tags travel with the video track into the output.
        let tags: HashMap<String, String> = input
            .metadata()
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let mut video_binding = None;
        let mut video_info = None;
        if let Some(stream) = input.streams().best(Type::Video) {
            let stream_index = stream.index();
            let parameters = stream.parameters();
            let decoder = CodecContext::from_parameters(parameters.clone())
                .and_then(|context| context.decoder().video())
                .map_err(|error| RecompressError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                })?;

            let frame_rate = {
                let rate = stream.avg_frame_rate();
                if rate.denominator() != 0 {
                    rate.numerator() as f64 / rate.denominator() as f64
                } else {
                    0.0
                }
            };

            let rotation = stream
                .metadata()
                .get("rotate")
                .and_then(|value| value.parse::<i32>().ok());

            video_info = Some(VideoTrackInfo {
                width: decoder.width(),
                height: decoder.height(),
                frame_rate,
                rotation,
                tags: tags.clone(),
            });
            video_binding = Some(TrackBinding {
                stream_index,
                time_base: stream.time_base(),
                parameters,
            });
        }

        let mut audio_binding = None;
        let mut audio_info = None;
        if let Some(stream) = input.streams().best(Type::Audio) {
            let stream_index = stream.index();
            let parameters = stream.parameters();
            let decoder = CodecContext::from_parameters(parameters.clone())
                .and_then(|context| context.decoder().audio())
                .map_err(|error| RecompressError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read audio codec parameters: {error}"),
                })?;

            audio_info = Some(AudioTrackInfo {
                channels: decoder.channels(),
                sample_rate: decoder.rate(),
            });
            audio_binding = Some(TrackBinding {
                stream_index,
                time_base: stream.time_base(),
                parameters,
            });
        }

        log::info!(
            "Opened media source: {} (duration={:.2}s, video={}, audio={})",
            file_path.display(),
            duration.as_secs_f64(),
            video_info.is_some(),
            audio_info.is_some(),
        );

        let mut queues = HashMap::new();
        if let Some(binding) = &video_binding {
            queues.insert(binding.stream_index, VecDeque::new());
        }
        if let Some(binding) = &audio_binding {
            queues.insert(binding.stream_index, VecDeque::new());
        }

        Ok(Self {
            shared: Arc::new(Mutex::new(SharedDemuxer {
                input,
                queues,
                eof: false,
            })),
            video_binding,
            audio_binding,
            video_info,
            audio_info,
            duration,
            file_path,
        })
    }

    /// The path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl MediaInput for MediaSource {
    type Source = DecodedTrackSource;

    fn video_info(&self) -> Option<&VideoTrackInfo> {
        self.video_info.as_ref()
    }

    fn audio_info(&self) -> Option<&AudioTrackInfo> {
        self.audio_info.as_ref()
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn open_source(&mut self, kind: MediaKind) -> Result<Self::Source, RecompressError> {
        let binding = match kind {
            MediaKind::Video => self.video_binding.as_ref(),
            MediaKind::Audio => self.audio_binding.as_ref(),
        }
        .ok_or_else(|| RecompressError::DemuxError(format!("no {kind:?} track in input")))?;

        let context = CodecContext::from_parameters(binding.parameters.clone())
            .map_err(|error| RecompressError::DemuxError(error.to_string()))?;

        let decoder = match kind {
            MediaKind::Video => TrackDecoder::Video(
                context
                    .decoder()
                    .video()
                    .map_err(|error| RecompressError::DemuxError(error.to_string()))?,
            ),
            MediaKind::Audio => TrackDecoder::Audio(
                context
                    .decoder()
                    .audio()
                    .map_err(|error| RecompressError::DemuxError(error.to_string()))?,
            ),
        };

        Ok(DecodedTrackSource {
            shared: Arc::clone(&self.shared),
            stream_index: binding.stream_index,
            time_base: binding.time_base,
            decoder,
            eof_sent: false,
            done: false,
        })
    }
}

enum TrackDecoder {
    Video(VideoDecoder),
    Audio(AudioDecoder),
}

/// A pull source of decoded samples for one track.
///
/// Forward-only and not restartable: packets are consumed from the shared
/// single-pass demuxer and fed to this track's decoder on demand.
pub struct DecodedTrackSource {
    shared: Arc<Mutex<SharedDemuxer>>,
    stream_index: usize,
    time_base: Rational,
    decoder: TrackDecoder,
    eof_sent: bool,
    done: bool,
}

// Owned by exactly one track loop; the decoder context is never shared.
unsafe impl Send for DecodedTrackSource {}

impl DecodedTrackSource {
    /// Try to receive one decoded frame from the decoder's buffer.
    fn receive_decoded(&mut self) -> Option<Sample> {
        match &mut self.decoder {
            TrackDecoder::Video(decoder) => {
                let mut frame = VideoFrame::empty();
                if decoder.receive_frame(&mut frame).is_ok() {
                    let pts = pts_to_duration(frame.pts().unwrap_or(0), self.time_base);
                    return Some(Sample {
                        pts,
                        data: SampleData::VideoFrame(frame),
                    });
                }
            }
            TrackDecoder::Audio(decoder) => {
                let mut frame = AudioFrame::empty();
                if decoder.receive_frame(&mut frame).is_ok() {
                    let pts = pts_to_duration(frame.pts().unwrap_or(0), self.time_base);
                    return Some(Sample {
                        pts,
                        data: SampleData::AudioFrame(frame),
                    });
                }
            }
        }
        None
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<(), RecompressError> {
        let result = match &mut self.decoder {
            TrackDecoder::Video(decoder) => decoder.send_packet(packet),
            TrackDecoder::Audio(decoder) => decoder.send_packet(packet),
        };
        result.map_err(|error| RecompressError::DemuxError(error.to_string()))
    }

    fn send_eof(&mut self) -> Result<(), RecompressError> {
        let result = match &mut self.decoder {
            TrackDecoder::Video(decoder) => decoder.send_eof(),
            TrackDecoder::Audio(decoder) => decoder.send_eof(),
        };
        result.map_err(|error| RecompressError::DemuxError(error.to_string()))
    }
}

impl TrackSource for DecodedTrackSource {
    fn next_sample(&mut self) -> Result<Option<Sample>, RecompressError> {
        loop {
            if self.done {
                return Ok(None);
            }

            if let Some(sample) = self.receive_decoded() {
                return Ok(Some(sample));
            }

            // Decoder has no buffered frames; feed it more packets.
            if self.eof_sent {
                self.done = true;
                return Ok(None);
            }

            let poll = {
                let mut shared = self.shared.lock().unwrap();
                shared.poll_packet(self.stream_index)
            };

            match poll {
                PacketPoll::Ready(packet) => self.send_packet(&packet)?,
                PacketPoll::Blocked => thread::park_timeout(QUEUE_FULL_BACKOFF),
                PacketPoll::Failed(error) => {
                    return Err(RecompressError::DemuxError(format!(
                        "giving up after {READ_ERROR_LIMIT} consecutive read failures: {error}"
                    )));
                }
                PacketPoll::End => {
                    self.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn close(&mut self) {
        self.done = true;
        // Drop this track's queue so a closed track can never back-pressure
        // the sibling's reads.
        let mut shared = self.shared.lock().unwrap();
        shared.queues.remove(&self.stream_index);
    }
}
