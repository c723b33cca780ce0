//! Transcode session integration tests.
//!
//! These drive the full session state machine through scripted sources and
//! sinks, so every lifecycle path (completion, failure, cancellation,
//! cleanup) is exercised without touching FFmpeg.

use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use recompress::{
    AudioEncodeParameters, AudioTrackInfo, EncodeOptions, EncodeParameters, MediaInput, MediaKind,
    MediaOutput, NoOpProgress, ProgressCallback, QualityLevel, RecompressError, ResolutionPreset,
    ResolutionTarget, Sample, SampleData, SessionState, TrackSink, TrackSource, TranscodeSession,
    VideoTrackInfo,
};
use tempfile::tempdir;

// ── Scripted input ─────────────────────────────────────────────────

/// One scripted step of a fake track source.
enum Step {
    /// Yield a sample with this timestamp.
    Emit(Duration),
    /// Fail with a demux error.
    Fail,
}

struct FakeSource {
    steps: VecDeque<Step>,
    /// Sleep inserted before each pull, to model decode latency.
    delay: Duration,
}

impl TrackSource for FakeSource {
    fn next_sample(&mut self) -> Result<Option<Sample>, RecompressError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        match self.steps.pop_front() {
            Some(Step::Emit(pts)) => Ok(Some(Sample {
                pts,
                data: SampleData::Raw(vec![0; 16]),
            })),
            Some(Step::Fail) => Err(RecompressError::DemuxError(
                "scripted decode failure".to_string(),
            )),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.steps.clear();
    }
}

struct FakeInput {
    video_info: Option<VideoTrackInfo>,
    audio_info: Option<AudioTrackInfo>,
    duration: Duration,
    video_source: Option<FakeSource>,
    audio_source: Option<FakeSource>,
}

impl FakeInput {
    fn new(duration: Duration) -> Self {
        Self {
            video_info: None,
            audio_info: None,
            duration,
            video_source: None,
            audio_source: None,
        }
    }

    fn with_video(mut self, width: u32, height: u32, steps: Vec<Step>, delay: Duration) -> Self {
        self.video_info = Some(VideoTrackInfo {
            width,
            height,
            frame_rate: 30.0,
            rotation: None,
            tags: Default::default(),
        });
        self.video_source = Some(FakeSource {
            steps: steps.into(),
            delay,
        });
        self
    }

    fn with_audio(mut self, steps: Vec<Step>, delay: Duration) -> Self {
        self.audio_info = Some(AudioTrackInfo {
            channels: 2,
            sample_rate: 48_000,
        });
        self.audio_source = Some(FakeSource {
            steps: steps.into(),
            delay,
        });
        self
    }
}

impl MediaInput for FakeInput {
    type Source = FakeSource;

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
        let source = match kind {
            MediaKind::Video => self.video_source.take(),
            MediaKind::Audio => self.audio_source.take(),
        };
        source.ok_or_else(|| RecompressError::DemuxError(format!("no {kind:?} track")))
    }
}

/// Emit `count` samples spread evenly across `duration`.
fn evenly_spaced(count: u64, duration: Duration) -> Vec<Step> {
    (1..=count)
        .map(|index| Step::Emit(duration.mul_f64(index as f64 / count as f64)))
        .collect()
}

// ── Scripted output ────────────────────────────────────────────────

/// Everything the fake output observed, for assertions after the run.
#[derive(Default)]
struct OutputLog {
    video_parameters: Mutex<Option<EncodeParameters>>,
    audio_parameters: Mutex<Option<AudioEncodeParameters>>,
    video_pts: Mutex<Vec<Duration>>,
    audio_pts: Mutex<Vec<Duration>>,
    video_finished: AtomicBool,
    audio_finished: AtomicBool,
    started: AtomicBool,
    finalized: AtomicBool,
}

struct FakeOutput {
    log: Arc<OutputLog>,
    path: PathBuf,
    /// Scripted per-sink submit failures.
    fail_video_submit: bool,
    /// Polls of the video sink's readiness that report not-ready first.
    video_not_ready_polls: usize,
}

impl FakeOutput {
    fn factory(
        log: Arc<OutputLog>,
    ) -> impl FnOnce(&Path) -> Result<FakeOutput, RecompressError> {
        move |path| {
            fs::write(path, b"partial")?;
            Ok(FakeOutput {
                log,
                path: path.to_path_buf(),
                fail_video_submit: false,
                video_not_ready_polls: 0,
            })
        }
    }
}

struct FakeSink {
    kind: MediaKind,
    log: Arc<OutputLog>,
    fail_submit: bool,
    not_ready_polls: AtomicUsize,
    finished: AtomicBool,
    /// Set by a readiness poll that returned true, consumed by `submit`.
    ready_granted: AtomicBool,
}

impl FakeSink {
    fn new(kind: MediaKind, log: Arc<OutputLog>, fail_submit: bool, not_ready_polls: usize) -> Self {
        Self {
            kind,
            log,
            fail_submit,
            not_ready_polls: AtomicUsize::new(not_ready_polls),
            finished: AtomicBool::new(false),
            ready_granted: AtomicBool::new(false),
        }
    }
}

impl TrackSink for FakeSink {
    fn is_ready_for_more_input(&self) -> bool {
        if self.finished.load(Ordering::Relaxed) {
            return false;
        }
        let remaining = self.not_ready_polls.load(Ordering::Relaxed);
        if remaining > 0 {
            self.not_ready_polls.store(remaining - 1, Ordering::Relaxed);
            return false;
        }
        self.ready_granted.store(true, Ordering::Relaxed);
        true
    }

    fn submit(&mut self, sample: Sample) -> Result<(), RecompressError> {
        // The backpressure contract: every submit must be preceded by a
        // readiness poll that returned true.
        if !self.ready_granted.swap(false, Ordering::Relaxed) {
            return Err(RecompressError::WriterNotReady(self.kind));
        }
        if self.fail_submit {
            return Err(RecompressError::EncodeError(
                "scripted encode failure".to_string(),
            ));
        }
        match self.kind {
            MediaKind::Video => self.log.video_pts.lock().unwrap().push(sample.pts),
            MediaKind::Audio => self.log.audio_pts.lock().unwrap().push(sample.pts),
        }
        Ok(())
    }

    fn mark_finished(&mut self) -> Result<(), RecompressError> {
        self.finished.store(true, Ordering::Relaxed);
        match self.kind {
            MediaKind::Video => self.log.video_finished.store(true, Ordering::Relaxed),
            MediaKind::Audio => self.log.audio_finished.store(true, Ordering::Relaxed),
        }
        Ok(())
    }
}

impl MediaOutput for FakeOutput {
    type Sink = FakeSink;

    fn create(path: &Path) -> Result<Self, RecompressError> {
        fs::write(path, b"partial")?;
        Ok(Self {
            log: Arc::new(OutputLog::default()),
            path: path.to_path_buf(),
            fail_video_submit: false,
            video_not_ready_polls: 0,
        })
    }

    fn open_video_sink(
        &mut self,
        parameters: &EncodeParameters,
        _info: &VideoTrackInfo,
    ) -> Result<Self::Sink, RecompressError> {
        *self.log.video_parameters.lock().unwrap() = Some(*parameters);
        Ok(FakeSink::new(
            MediaKind::Video,
            self.log.clone(),
            self.fail_video_submit,
            self.video_not_ready_polls,
        ))
    }

    fn open_audio_sink(
        &mut self,
        parameters: &AudioEncodeParameters,
    ) -> Result<Self::Sink, RecompressError> {
        *self.log.audio_parameters.lock().unwrap() = Some(*parameters);
        Ok(FakeSink::new(MediaKind::Audio, self.log.clone(), false, 0))
    }

    fn start(&mut self) -> Result<(), RecompressError> {
        self.log.started.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn finalize(self) -> Result<(), RecompressError> {
        // Finalizing requires every opened sink to have been marked done.
        if self.log.video_parameters.lock().unwrap().is_some()
            && !self.log.video_finished.load(Ordering::Relaxed)
        {
            return Err(RecompressError::FinalizeError(
                "video sink not finished".to_string(),
            ));
        }
        if self.log.audio_parameters.lock().unwrap().is_some()
            && !self.log.audio_finished.load(Ordering::Relaxed)
        {
            return Err(RecompressError::FinalizeError(
                "audio sink not finished".to_string(),
            ));
        }
        fs::write(&self.path, b"final")?;
        self.log.finalized.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Completion ─────────────────────────────────────────────────────

#[test]
fn completes_with_both_tracks() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(10);
    let input = FakeInput::new(duration)
        .with_video(1920, 1080, evenly_spaced(10, duration), Duration::ZERO)
        .with_audio(evenly_spaced(8, duration), Duration::ZERO);

    let log = Arc::new(OutputLog::default());
    let session = TranscodeSession::new(input, EncodeOptions::new(), &output);
    let written = session
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    assert_eq!(written, output);
    assert_eq!(fs::read(&output).unwrap(), b"final");
    assert!(log.started.load(Ordering::Relaxed));
    assert!(log.finalized.load(Ordering::Relaxed));
    assert!(log.video_finished.load(Ordering::Relaxed));
    assert!(log.audio_finished.load(Ordering::Relaxed));
    assert_eq!(log.video_pts.lock().unwrap().len(), 10);
    assert_eq!(log.audio_pts.lock().unwrap().len(), 8);
}

#[test]
fn samples_arrive_in_pull_order() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(5);
    let input = FakeInput::new(duration).with_video(
        1280,
        720,
        evenly_spaced(50, duration),
        Duration::ZERO,
    );

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    let pts = log.video_pts.lock().unwrap();
    assert_eq!(pts.len(), 50);
    assert!(pts.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn video_only_input_completes() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(4);
    let input =
        FakeInput::new(duration).with_video(640, 480, evenly_spaced(4, duration), Duration::ZERO);

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    assert!(log.finalized.load(Ordering::Relaxed));
    assert!(log.audio_parameters.lock().unwrap().is_none());
}

#[test]
fn audio_only_input_completes() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(4);
    let input = FakeInput::new(duration).with_audio(evenly_spaced(6, duration), Duration::ZERO);

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    assert!(log.finalized.load(Ordering::Relaxed));
    assert!(log.video_parameters.lock().unwrap().is_none());
    assert_eq!(log.audio_pts.lock().unwrap().len(), 6);
}

#[test]
fn join_barrier_waits_for_the_slow_track() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(2);
    // Video finishes immediately; audio trickles in.
    let input = FakeInput::new(duration)
        .with_video(1280, 720, evenly_spaced(2, duration), Duration::ZERO)
        .with_audio(evenly_spaced(20, duration), Duration::from_millis(5));

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    // Finalize only ran after the audio track delivered everything; the
    // fake output errors otherwise.
    assert!(log.finalized.load(Ordering::Relaxed));
    assert_eq!(log.audio_pts.lock().unwrap().len(), 20);
}

#[test]
fn backpressure_delays_but_does_not_drop_samples() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(3);
    let input =
        FakeInput::new(duration).with_video(1280, 720, evenly_spaced(12, duration), Duration::ZERO);

    let log = Arc::new(OutputLog::default());
    let factory = {
        let log = log.clone();
        move |path: &Path| {
            fs::write(path, b"partial")?;
            Ok(FakeOutput {
                log,
                path: path.to_path_buf(),
                fail_video_submit: false,
                video_not_ready_polls: 25,
            })
        }
    };

    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(factory, Arc::new(NoOpProgress))
        .unwrap();

    assert_eq!(log.video_pts.lock().unwrap().len(), 12);
}

#[test]
fn submit_requires_a_prior_readiness_grant() {
    // The fake sinks used throughout this suite reject any submit that was
    // not preceded by a readiness poll returning true, so every completing
    // session above also proves the pull loop honors the contract. This
    // pins the detector itself.
    let mut sink = FakeSink::new(MediaKind::Video, Arc::default(), false, 0);

    let ungated = Sample {
        pts: Duration::ZERO,
        data: SampleData::Raw(Vec::new()),
    };
    assert!(matches!(
        sink.submit(ungated),
        Err(RecompressError::WriterNotReady(MediaKind::Video))
    ));

    assert!(sink.is_ready_for_more_input());
    let gated = Sample {
        pts: Duration::ZERO,
        data: SampleData::Raw(Vec::new()),
    };
    assert!(sink.submit(gated).is_ok());

    // Each grant covers exactly one submit.
    let second = Sample {
        pts: Duration::ZERO,
        data: SampleData::Raw(Vec::new()),
    };
    assert!(matches!(
        sink.submit(second),
        Err(RecompressError::WriterNotReady(MediaKind::Video))
    ));
}

// ── Parameter derivation ───────────────────────────────────────────

#[test]
fn derived_parameters_reach_the_video_sink() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(10);
    let input = FakeInput::new(duration)
        .with_video(3840, 2160, evenly_spaced(10, duration), Duration::ZERO)
        .with_audio(evenly_spaced(10, duration), Duration::ZERO);

    let options = EncodeOptions::new()
        .quality(QualityLevel::new(3))
        .resolution(ResolutionPreset::Hd720.target());

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, options, &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    let parameters = log.video_parameters.lock().unwrap().unwrap();
    assert_eq!((parameters.width, parameters.height), (1280, 720));
    assert_eq!(parameters.bitrate, 2_600_000);

    let audio = log.audio_parameters.lock().unwrap().unwrap();
    assert_eq!(audio, AudioEncodeParameters::default());
}

#[test]
fn bitrate_cap_applies_to_derived_parameters() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(2);
    let input =
        FakeInput::new(duration).with_video(1920, 1080, evenly_spaced(2, duration), Duration::ZERO);

    let options = EncodeOptions::new()
        .resolution(ResolutionTarget::Original)
        .max_bitrate(4_000_000);

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, options, &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    let parameters = log.video_parameters.lock().unwrap().unwrap();
    assert_eq!(parameters.bitrate, 4_000_000);
}

// ── Preparation failures ───────────────────────────────────────────

#[test]
fn input_without_tracks_fails() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let input = FakeInput::new(Duration::from_secs(1));
    let result = TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(Arc::default()), Arc::new(NoOpProgress));

    assert!(matches!(result, Err(RecompressError::DemuxError(_))));
    assert!(!output.exists());
}

#[test]
fn zero_duration_with_video_fails() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let input = FakeInput::new(Duration::ZERO).with_video(
        1920,
        1080,
        evenly_spaced(3, Duration::from_secs(1)),
        Duration::ZERO,
    );

    let result = TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(Arc::default()), Arc::new(NoOpProgress));

    assert!(matches!(
        result,
        Err(RecompressError::MissingTrackGeometry { .. })
    ));
    assert!(!output.exists());
}

#[test]
fn zero_sized_video_track_fails() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(2);
    let input =
        FakeInput::new(duration).with_video(0, 0, evenly_spaced(2, duration), Duration::ZERO);

    let result = TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(Arc::default()), Arc::new(NoOpProgress));

    assert!(matches!(
        result,
        Err(RecompressError::MissingTrackGeometry { .. })
    ));
}

#[test]
fn stale_output_is_replaced() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    fs::write(&output, b"stale artifact from a previous run").unwrap();

    let duration = Duration::from_secs(2);
    let input =
        FakeInput::new(duration).with_video(1280, 720, evenly_spaced(2, duration), Duration::ZERO);

    let log = Arc::new(OutputLog::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
        .unwrap();

    assert_eq!(fs::read(&output).unwrap(), b"final");
}

// ── Runtime failures ───────────────────────────────────────────────

#[test]
fn source_failure_deletes_partial_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(10);
    let mut video_steps = evenly_spaced(3, duration);
    video_steps.push(Step::Fail);

    let input = FakeInput::new(duration)
        .with_video(1920, 1080, video_steps, Duration::ZERO)
        .with_audio(evenly_spaced(500, duration), Duration::from_millis(1));

    let log = Arc::new(OutputLog::default());
    let result = TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress));

    assert!(matches!(result, Err(RecompressError::DemuxError(_))));
    assert!(!output.exists());
    assert!(!log.finalized.load(Ordering::Relaxed));

    // The sibling track was torn down instead of running to completion.
    assert!(log.audio_pts.lock().unwrap().len() < 500);
}

#[test]
fn sink_failure_deletes_partial_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(5);
    let input =
        FakeInput::new(duration).with_video(1920, 1080, evenly_spaced(5, duration), Duration::ZERO);

    let log = Arc::new(OutputLog::default());
    let factory = {
        let log = log.clone();
        move |path: &Path| {
            fs::write(path, b"partial")?;
            Ok(FakeOutput {
                log,
                path: path.to_path_buf(),
                fail_video_submit: true,
                video_not_ready_polls: 0,
            })
        }
    };

    let result = TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(factory, Arc::new(NoOpProgress));

    assert!(matches!(result, Err(RecompressError::EncodeError(_))));
    assert!(!output.exists());
}

// ── Cancellation ───────────────────────────────────────────────────

#[test]
fn cancellation_stops_the_session_and_deletes_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(100);
    let input = FakeInput::new(duration)
        .with_video(1920, 1080, evenly_spaced(10_000, duration), Duration::from_millis(1))
        .with_audio(evenly_spaced(10_000, duration), Duration::from_millis(1));

    let log = Arc::new(OutputLog::default());
    let session = TranscodeSession::new(input, EncodeOptions::new(), &output);
    let token = session.cancellation_token();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.cancel();
    });

    let result = session.run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress));
    canceller.join().unwrap();

    assert!(matches!(result, Err(RecompressError::Cancelled)));
    assert!(!output.exists());
    assert!(!log.finalized.load(Ordering::Relaxed));
}

#[test]
fn cancellation_before_run_is_observed_immediately() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(10);
    let input = FakeInput::new(duration).with_video(
        1920,
        1080,
        evenly_spaced(100, duration),
        Duration::ZERO,
    );

    let session = TranscodeSession::new(input, EncodeOptions::new(), &output);
    session.cancellation_token().cancel();

    let result = session.run_with(FakeOutput::factory(Arc::default()), Arc::new(NoOpProgress));

    assert!(matches!(result, Err(RecompressError::Cancelled)));
    assert!(!output.exists());
}

// ── Progress ───────────────────────────────────────────────────────

/// Records every delivered fraction.
#[derive(Default)]
struct Recorder {
    fractions: Mutex<Vec<f32>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, fraction: f32) {
        self.fractions.lock().unwrap().push(fraction);
    }
}

#[test]
fn progress_is_monotonic_and_bounded() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(5);
    // 60 ms between video samples clears the 50 ms report throttle.
    let input = FakeInput::new(duration)
        .with_video(1280, 720, evenly_spaced(5, duration), Duration::from_millis(60))
        .with_audio(evenly_spaced(5, duration), Duration::ZERO);

    let recorder = Arc::new(Recorder::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(
            FakeOutput::factory(Arc::default()),
            recorder.clone() as Arc<dyn ProgressCallback>,
        )
        .unwrap();

    let fractions = recorder.fractions.lock().unwrap();
    assert!(!fractions.is_empty());
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert!(fractions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(*fractions.last().unwrap(), 1.0);
}

#[test]
fn audio_only_session_reports_no_progress() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let duration = Duration::from_secs(5);
    let input = FakeInput::new(duration)
        .with_audio(evenly_spaced(10, duration), Duration::from_millis(60));

    let recorder = Arc::new(Recorder::default());
    TranscodeSession::new(input, EncodeOptions::new(), &output)
        .run_with(
            FakeOutput::factory(Arc::default()),
            recorder.clone() as Arc<dyn ProgressCallback>,
        )
        .unwrap();

    // Progress tracks the video timeline only.
    assert!(recorder.fractions.lock().unwrap().is_empty());
}

// ── State machine ──────────────────────────────────────────────────

#[test]
fn new_session_is_idle() {
    let input = FakeInput::new(Duration::from_secs(1));
    let session = TranscodeSession::new(input, EncodeOptions::new(), "unused.mp4");
    assert_eq!(*session.state(), SessionState::Idle);
}

#[test]
fn back_to_back_sessions_on_the_same_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    for _ in 0..3 {
        let duration = Duration::from_secs(2);
        let input = FakeInput::new(duration).with_video(
            1280,
            720,
            evenly_spaced(4, duration),
            Duration::ZERO,
        );

        let log = Arc::new(OutputLog::default());
        TranscodeSession::new(input, EncodeOptions::new(), &output)
            .run_with(FakeOutput::factory(log.clone()), Arc::new(NoOpProgress))
            .unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"final");
        assert!(log.finalized.load(Ordering::Relaxed));
    }
}
