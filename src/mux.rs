//! FFmpeg-backed output container and encoding sinks.
//!
//! [`OutputContainer`] owns the output muxer; [`VideoEncodeSink`] and
//! [`AudioEncodeSink`] encode decoded samples and write the resulting
//! packets interleaved into the shared container. Video is scaled to the
//! derived output size and encoded at the target bitrate; audio is
//! resampled to the fixed target layout (stereo, 44.1 kHz) and encoded as
//! AAC.
//!
//! Both sinks honor the [`TrackSink`] backpressure contract. A software
//! encoder accepts input whenever its packet queue has been drained, which
//! this implementation does after every submit, so these sinks are ready
//! except after [`mark_finished`](TrackSink::mark_finished).

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use ffmpeg_next::{
    ChannelLayout, Dictionary, Packet, Rational,
    codec::context::Context as CodecContext,
    encoder::{Audio as AudioEncoder, Video as VideoEncoder},
    format::{Flags as FormatFlags, Pixel, Sample as SampleFormat, context::Output, sample::Type as SampleType},
    frame::{Audio as AudioFrame, Video as VideoFrame},
    software::{
        resampling::Context as ResamplingContext,
        scaling::{Context as ScalingContext, Flags as ScalingFlags},
    },
};

use crate::conversion::duration_to_pts;
use crate::error::RecompressError;
use crate::settings::{AudioEncodeParameters, EncodeParameters};
use crate::track::{MediaKind, MediaOutput, Sample, SampleData, TrackSink, VideoTrackInfo};

/// Time base used for video frame timestamps fed to the encoder.
const VIDEO_TIME_BASE: Rational = Rational(1, 90_000);

/// The muxer context shared between the container and its sinks.
struct MuxShared {
    output: Output,
}

// Only ever accessed through the owning mutex, one thread at a time; the
// underlying AVFormatContext has no thread affinity.
unsafe impl Send for MuxShared {}

impl MuxShared {
    /// Rescale a packet from `source_time_base` and write it interleaved.
    fn write_packet(
        &mut self,
        packet: &mut Packet,
        stream_index: usize,
        source_time_base: Rational,
    ) -> Result<(), RecompressError> {
        packet.set_stream(stream_index);
        let stream_time_base = self
            .output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| {
                RecompressError::EncodeError(format!("output stream {stream_index} missing"))
            })?;
        packet.rescale_ts(source_time_base, stream_time_base);
        packet.set_position(-1);
        packet
            .write_interleaved(&mut self.output)
            .map_err(|error| RecompressError::EncodeError(format!("write packet failed: {error}")))
    }
}

/// An MP4 output container being assembled, one sink per track.
///
/// Created by the session during preparation; finalizing commits the
/// trailer and index structures. Dropping an unfinalized container
/// abandons the file (the session deletes it afterwards).
pub struct OutputContainer {
    shared: Arc<Mutex<MuxShared>>,
    path: PathBuf,
    needs_global_header: bool,
}

impl MediaOutput for OutputContainer {
    type Sink = EncodeSink;

    fn create(path: &Path) -> Result<Self, RecompressError> {
        ffmpeg_next::init()
            .map_err(|error| RecompressError::EncodeError(error.to_string()))?;

        let output = ffmpeg_next::format::output(&path).map_err(|error| {
            RecompressError::EncodeError(format!(
                "cannot create output container at {}: {error}",
                path.display(),
            ))
        })?;

        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        log::debug!("Created output container: {}", path.display());

        Ok(Self {
            shared: Arc::new(Mutex::new(MuxShared { output })),
            path: path.to_path_buf(),
            needs_global_header,
        })
    }

    fn open_video_sink(
        &mut self,
        parameters: &EncodeParameters,
        info: &VideoTrackInfo,
    ) -> Result<Self::Sink, RecompressError> {
        let codec_id = parameters.codec.codec_id();
        let codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            RecompressError::EncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut shared = self.shared.lock().unwrap();

        // Container-level tags ride along from the source; they must be in
        // place before the header is written.
        if !info.tags.is_empty() {
            let mut tags = Dictionary::new();
            for (key, value) in &info.tags {
                tags.set(key, value);
            }
            shared.output.set_metadata(tags);
        }

        let mut stream = shared
            .output
            .add_stream(codec)
            .map_err(|error| RecompressError::EncodeError(format!("cannot add stream: {error}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| RecompressError::EncodeError(error.to_string()))?
            .encoder()
            .video()
            .map_err(|error| RecompressError::EncodeError(error.to_string()))?;

        encoder.set_width(parameters.width);
        encoder.set_height(parameters.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(VIDEO_TIME_BASE);
        encoder.set_bit_rate(parameters.bitrate as usize);

        if self.needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let opened = encoder.open_as(codec).map_err(|error| {
            RecompressError::EncodeError(format!(
                "cannot open {codec_id:?} encoder at {} bit/s: {error}",
                parameters.bitrate,
            ))
        })?;

        stream.set_parameters(&opened);

        // The source orientation travels as the conventional rotate tag.
        if let Some(rotation) = info.rotation {
            let mut stream_tags = Dictionary::new();
            stream_tags.set("rotate", &rotation.to_string());
            stream.set_metadata(stream_tags);
        }

        log::info!(
            "Video sink: {}x{} {:?} @ {} bit/s",
            parameters.width,
            parameters.height,
            parameters.codec,
            parameters.bitrate,
        );

        Ok(EncodeSink::Video(VideoEncodeSink {
            shared: Arc::clone(&self.shared),
            stream_index,
            encoder: opened,
            scaler: None,
            width: parameters.width,
            height: parameters.height,
            finished: false,
        }))
    }

    fn open_audio_sink(
        &mut self,
        parameters: &AudioEncodeParameters,
    ) -> Result<Self::Sink, RecompressError> {
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::AAC)
            .ok_or_else(|| RecompressError::EncodeError("AAC encoder not available".to_string()))?;

        let mut shared = self.shared.lock().unwrap();

        let mut stream = shared
            .output
            .add_stream(codec)
            .map_err(|error| RecompressError::EncodeError(format!("cannot add stream: {error}")))?;
        let stream_index = stream.index();

        let sample_format = SampleFormat::F32(SampleType::Planar);
        let channel_layout = ChannelLayout::STEREO;

        let mut encoder = CodecContext::new()
            .encoder()
            .audio()
            .map_err(|error| RecompressError::EncodeError(error.to_string()))?;

        encoder.set_rate(parameters.sample_rate as i32);
        encoder.set_channel_layout(channel_layout);
        encoder.set_format(sample_format);
        encoder.set_time_base(Rational(1, parameters.sample_rate as i32));
        encoder.set_bit_rate(parameters.bitrate as usize);

        if self.needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let opened = encoder.open_as(codec).map_err(|error| {
            RecompressError::EncodeError(format!("cannot open AAC encoder: {error}"))
        })?;

        stream.set_parameters(&opened);

        log::info!(
            "Audio sink: {} ch, {} Hz AAC @ {} bit/s",
            parameters.channels,
            parameters.sample_rate,
            parameters.bitrate,
        );

        Ok(EncodeSink::Audio(AudioEncodeSink {
            shared: Arc::clone(&self.shared),
            stream_index,
            encoder: opened,
            resampler: None,
            sample_format,
            channel_layout,
            sample_rate: parameters.sample_rate,
            samples_written: 0,
            finished: false,
        }))
    }

    fn start(&mut self) -> Result<(), RecompressError> {
        let mut shared = self.shared.lock().unwrap();
        shared
            .output
            .write_header()
            .map_err(|error| RecompressError::EncodeError(format!("cannot write header: {error}")))
    }

    fn finalize(self) -> Result<(), RecompressError> {
        let mut shared = self.shared.lock().unwrap();
        shared
            .output
            .write_trailer()
            .map_err(|error| RecompressError::FinalizeError(error.to_string()))?;
        log::info!("Finalized output container: {}", self.path.display());
        Ok(())
    }
}

/// The sink for either track of an [`OutputContainer`].
pub enum EncodeSink {
    /// Scaling + video encoding sink.
    Video(VideoEncodeSink),
    /// Resampling + AAC encoding sink.
    Audio(AudioEncodeSink),
}

impl TrackSink for EncodeSink {
    fn is_ready_for_more_input(&self) -> bool {
        match self {
            EncodeSink::Video(sink) => !sink.finished,
            EncodeSink::Audio(sink) => !sink.finished,
        }
    }

    fn submit(&mut self, sample: Sample) -> Result<(), RecompressError> {
        match self {
            EncodeSink::Video(sink) => sink.submit(sample),
            EncodeSink::Audio(sink) => sink.submit(sample),
        }
    }

    fn mark_finished(&mut self) -> Result<(), RecompressError> {
        match self {
            EncodeSink::Video(sink) => sink.mark_finished(),
            EncodeSink::Audio(sink) => sink.mark_finished(),
        }
    }
}

/// Scales decoded frames to the output size and encodes them.
pub struct VideoEncodeSink {
    shared: Arc<Mutex<MuxShared>>,
    stream_index: usize,
    encoder: VideoEncoder,
    scaler: Option<ScalingContext>,
    width: u32,
    height: u32,
    finished: bool,
}

// Owned by exactly one track loop; encoder and scaler are never shared.
unsafe impl Send for VideoEncodeSink {}

impl VideoEncodeSink {
    fn submit(&mut self, sample: Sample) -> Result<(), RecompressError> {
        if self.finished {
            return Err(RecompressError::WriterNotReady(MediaKind::Video));
        }

        let SampleData::VideoFrame(frame) = sample.data else {
            return Err(RecompressError::EncodeError(
                "video sink received a non-video sample".to_string(),
            ));
        };

        // The scaler is built from the first frame, once the source pixel
        // format is actually known.
        let scaler = match &mut self.scaler {
            Some(scaler) => scaler,
            None => {
                let scaler = ScalingContext::get(
                    frame.format(),
                    frame.width(),
                    frame.height(),
                    Pixel::YUV420P,
                    self.width,
                    self.height,
                    ScalingFlags::BILINEAR,
                )
                .map_err(|error| {
                    RecompressError::EncodeError(format!("cannot create scaler: {error}"))
                })?;
                self.scaler.insert(scaler)
            }
        };

        let mut scaled = VideoFrame::empty();
        scaler
            .run(&frame, &mut scaled)
            .map_err(|error| RecompressError::EncodeError(format!("scaling failed: {error}")))?;

        scaled.set_pts(Some(duration_to_pts(sample.pts, VIDEO_TIME_BASE)));

        self.encoder
            .send_frame(&scaled)
            .map_err(|error| RecompressError::EncodeError(format!("send_frame failed: {error}")))?;

        self.drain_packets()
    }

    fn mark_finished(&mut self) -> Result<(), RecompressError> {
        self.finished = true;
        self.encoder
            .send_eof()
            .map_err(|error| RecompressError::EncodeError(format!("send_eof failed: {error}")))?;
        self.drain_packets()
    }

    fn drain_packets(&mut self) -> Result<(), RecompressError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            let mut shared = self.shared.lock().unwrap();
            shared.write_packet(&mut packet, self.stream_index, VIDEO_TIME_BASE)?;
        }
        Ok(())
    }
}

/// Resamples decoded audio to the fixed target layout and encodes AAC.
pub struct AudioEncodeSink {
    shared: Arc<Mutex<MuxShared>>,
    stream_index: usize,
    encoder: AudioEncoder,
    resampler: Option<ResamplingContext>,
    sample_format: SampleFormat,
    channel_layout: ChannelLayout,
    sample_rate: u32,
    samples_written: i64,
    finished: bool,
}

// Owned by exactly one track loop; encoder and resampler are never shared.
unsafe impl Send for AudioEncodeSink {}

impl AudioEncodeSink {
    fn submit(&mut self, sample: Sample) -> Result<(), RecompressError> {
        if self.finished {
            return Err(RecompressError::WriterNotReady(MediaKind::Audio));
        }

        let SampleData::AudioFrame(frame) = sample.data else {
            return Err(RecompressError::EncodeError(
                "audio sink received a non-audio sample".to_string(),
            ));
        };

        let resampler = match &mut self.resampler {
            Some(resampler) => resampler,
            None => {
                let resampler = ResamplingContext::get(
                    frame.format(),
                    frame.channel_layout(),
                    frame.rate(),
                    self.sample_format,
                    self.channel_layout,
                    self.sample_rate,
                )
                .map_err(|error| {
                    RecompressError::EncodeError(format!("cannot create resampler: {error}"))
                })?;
                self.resampler.insert(resampler)
            }
        };

        let mut resampled = AudioFrame::empty();
        resampler
            .run(&frame, &mut resampled)
            .map_err(|error| RecompressError::EncodeError(format!("resampling failed: {error}")))?;

        // Audio timestamps count samples at the target rate.
        resampled.set_pts(Some(self.samples_written));
        self.samples_written += resampled.samples() as i64;

        self.encoder
            .send_frame(&resampled)
            .map_err(|error| RecompressError::EncodeError(format!("send_frame failed: {error}")))?;

        self.drain_packets()
    }

    fn mark_finished(&mut self) -> Result<(), RecompressError> {
        self.finished = true;
        self.encoder
            .send_eof()
            .map_err(|error| RecompressError::EncodeError(format!("send_eof failed: {error}")))?;
        self.drain_packets()
    }

    fn drain_packets(&mut self) -> Result<(), RecompressError> {
        let source_time_base = Rational(1, self.sample_rate as i32);
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            let mut shared = self.shared.lock().unwrap();
            shared.write_packet(&mut packet, self.stream_index, source_time_base)?;
        }
        Ok(())
    }
}
