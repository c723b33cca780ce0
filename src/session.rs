//! Transcode session — the state machine that drives one re-encode from
//! input container to finalized output.
//!
//! A [`TranscodeSession`] owns one [`TrackSource`]/[`TrackSink`] pair per
//! media kind present in the input, derives the video encode parameters
//! once, and drives both pairs on independent threads until every track
//! reports done. Completion is aggregated through a counted join barrier
//! over the session's event channel; the session thread is the single
//! writer of [`SessionState`], so terminal transitions happen exactly once.
//!
//! Progress is computed from the video track's presentation-time cursor
//! divided by the container duration, throttled to at most one report every
//! 50 ms. An audio track that outlives the video track does not advance the
//! fraction — video-duration-based progress is a documented limitation, not
//! an oversight.
//!
//! # Example
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
//! let session = TranscodeSession::new(input, options, "compressed.mp4");
//! let output = session.run::<OutputContainer>(Arc::new(NoOpProgress))?;
//! println!("wrote {}", output.display());
//! # Ok::<(), recompress::RecompressError>(())
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{Receiver, Sender, channel},
    },
    thread,
    time::Duration,
};

use crate::error::RecompressError;
use crate::progress::{CancellationToken, ProgressCallback, ProgressGate};
use crate::settings::{AudioEncodeParameters, EncodeOptions, EncodeParameters};
use crate::track::{MediaInput, MediaKind, MediaOutput, TrackSink, TrackSource};

/// How long a track loop parks when its sink reports not-ready.
const NOT_READY_BACKOFF: Duration = Duration::from_millis(2);

/// The lifecycle of one transcode session.
///
/// Transitions are monotonic: `Idle → Preparing → Running → {Finalizing →
/// Completed} | Failed | Cancelled`. Only `Running` is re-entered, and only
/// to update its progress in place.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Constructed, not yet started.
    Idle,
    /// Opening sources, deriving parameters, opening sinks.
    Preparing,
    /// Both track loops pulling; progress in `0.0..=1.0`.
    Running {
        /// Fraction of the video timeline processed so far.
        progress: f32,
    },
    /// All tracks done; committing the container.
    Finalizing,
    /// The output artifact is complete and owned by the caller.
    Completed {
        /// Location of the finished container.
        output: PathBuf,
    },
    /// The session failed; no output artifact remains.
    Failed {
        /// Human-readable failure cause.
        cause: String,
    },
    /// The session was cancelled; no output artifact remains.
    Cancelled,
}

/// Message sent from a track loop to the session's event loop.
enum TrackEvent {
    /// One sample was submitted; `pts` is its presentation timestamp.
    Advanced { kind: MediaKind, pts: Duration },
    /// The track's source is exhausted and its sink marked finished.
    Finished { kind: MediaKind },
    /// The track loop aborted with an error.
    Failed {
        kind: MediaKind,
        error: RecompressError,
    },
    /// The track loop observed the cancellation token and stopped.
    Cancelled { kind: MediaKind },
}

/// Drives one re-encode of `input` into a new container at `output_path`.
///
/// The session exclusively owns its sources and sinks for its lifetime. On
/// success the output artifact belongs to the caller; a failed or cancelled
/// session deletes any partial artifact before returning.
pub struct TranscodeSession<I: MediaInput> {
    input: I,
    options: EncodeOptions,
    output_path: PathBuf,
    cancel: CancellationToken,
    state: SessionState,
}

impl<I: MediaInput> TranscodeSession<I> {
    /// Create an idle session.
    ///
    /// Any existing file at `output_path` is deleted when the session
    /// starts preparing, so back-to-back sessions on the same location
    /// never trip over a leftover artifact.
    pub fn new<P: AsRef<Path>>(input: I, options: EncodeOptions, output_path: P) -> Self {
        Self {
            input,
            options,
            output_path: output_path.as_ref().to_path_buf(),
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
        }
    }

    /// A token that cancels this session cooperatively.
    ///
    /// Cancellation is checked at every pull-loop iteration and is possible
    /// at any point before finalization begins; the finalize step is
    /// atomic. There is no implicit timeout — callers wanting one race this
    /// token against a timer.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the session to a terminal state, creating the output container
    /// via [`MediaOutput::create`].
    ///
    /// Returns the output location on success. The `Err` side carries the
    /// single terminal diagnostic: a structured failure cause, or
    /// [`RecompressError::Cancelled`] as the cancellation acknowledgement.
    pub fn run<O: MediaOutput>(
        self,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<PathBuf, RecompressError> {
        self.run_with(O::create, progress)
    }

    /// Run the session with a caller-supplied output constructor.
    ///
    /// The constructor is invoked during preparation, after the stale
    /// output target has been deleted and the encode parameters derived.
    ///
    /// # Errors
    ///
    /// Exactly one of the [`RecompressError`] variants; whatever the cause,
    /// no partial artifact remains at the output location.
    pub fn run_with<O, F>(
        mut self,
        make_output: F,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<PathBuf, RecompressError>
    where
        O: MediaOutput,
        F: FnOnce(&Path) -> Result<O, RecompressError>,
    {
        self.state = SessionState::Preparing;
        log::info!(
            "Transcode session starting: output={}, options={:?}",
            self.output_path.display(),
            self.options,
        );

        match self.drive(make_output, progress) {
            Ok(output) => {
                self.state = SessionState::Completed {
                    output: output.clone(),
                };
                log::info!("Transcode session completed: {}", output.display());
                Ok(output)
            }
            Err(error) => {
                // Whatever went wrong, leave zero bytes behind.
                let _ = remove_artifact(&self.output_path);
                if matches!(error, RecompressError::Cancelled) {
                    self.state = SessionState::Cancelled;
                    log::info!("Transcode session cancelled");
                } else {
                    self.state = SessionState::Failed {
                        cause: error.to_string(),
                    };
                    log::warn!("Transcode session failed: {error}");
                }
                Err(error)
            }
        }
    }

    /// Preparing + Running + Finalizing, with the terminal bookkeeping left
    /// to [`run_with`].
    fn drive<O, F>(
        &mut self,
        make_output: F,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<PathBuf, RecompressError>
    where
        O: MediaOutput,
        F: FnOnce(&Path) -> Result<O, RecompressError>,
    {
        // Preparing: clean slate first, then sources, parameters, sinks.
        remove_artifact(&self.output_path)?;

        let video_info = self.input.video_info().cloned();
        let audio_info = self.input.audio_info().cloned();
        if video_info.is_none() && audio_info.is_none() {
            return Err(RecompressError::DemuxError(
                "input has no video or audio track".to_string(),
            ));
        }

        let duration = self.input.duration();
        if video_info.is_some() && duration.is_zero() {
            return Err(RecompressError::MissingTrackGeometry {
                detail: "container duration is zero".to_string(),
            });
        }

        let video_parameters = video_info
            .as_ref()
            .map(|info| EncodeParameters::derive(info.width, info.height, &self.options))
            .transpose()?;

        let video_source = video_info
            .as_ref()
            .map(|_| self.input.open_source(MediaKind::Video))
            .transpose()?;
        let audio_source = audio_info
            .as_ref()
            .map(|_| self.input.open_source(MediaKind::Audio))
            .transpose()?;

        let mut output = make_output(&self.output_path)?;

        let video_sink = match (&video_info, &video_parameters) {
            (Some(info), Some(parameters)) => Some(output.open_video_sink(parameters, info)?),
            _ => None,
        };
        let audio_sink = audio_info
            .as_ref()
            .map(|_| output.open_audio_sink(&AudioEncodeParameters::default()))
            .transpose()?;

        output.start()?;

        // Running: one loop per present track, joined by counted events.
        let (events_tx, events_rx) = channel();
        let mut pending_tracks = 0usize;
        let mut handles = Vec::new();

        if let (Some(source), Some(sink)) = (video_source, video_sink) {
            pending_tracks += 1;
            handles.push(spawn_track_loop(
                MediaKind::Video,
                source,
                sink,
                self.cancel.clone(),
                events_tx.clone(),
            ));
        }
        if let (Some(source), Some(sink)) = (audio_source, audio_sink) {
            pending_tracks += 1;
            handles.push(spawn_track_loop(
                MediaKind::Audio,
                source,
                sink,
                self.cancel.clone(),
                events_tx.clone(),
            ));
        }
        drop(events_tx);

        let outcome = self.consume_events(&events_rx, pending_tracks, duration, progress);

        for handle in handles {
            let _ = handle.join();
        }

        if let Err(error) = outcome {
            drop(output);
            return Err(error);
        }

        // A cancellation that raced the last track's completion still wins;
        // once finalization starts it no longer can.
        if self.cancel.is_cancelled() {
            drop(output);
            return Err(RecompressError::Cancelled);
        }

        self.state = SessionState::Finalizing;
        output.finalize()?;

        Ok(self.output_path.clone())
    }

    /// The session event loop: the join barrier and the single writer of
    /// progress and terminal causes.
    ///
    /// Returns `Ok(())` only when every pending track reported `Finished`.
    fn consume_events(
        &mut self,
        events: &Receiver<TrackEvent>,
        mut pending_tracks: usize,
        duration: Duration,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<(), RecompressError> {
        let mut gate = ProgressGate::new(progress);
        let total_seconds = duration.as_secs_f64();
        let mut terminal: Option<RecompressError> = None;

        while pending_tracks > 0 {
            let Ok(event) = events.recv() else {
                // All senders gone; the loops have exited.
                break;
            };

            match event {
                TrackEvent::Advanced { kind, pts } => {
                    // Only the video cursor is authoritative for progress.
                    if kind == MediaKind::Video && terminal.is_none() && total_seconds > 0.0 {
                        let fraction = (pts.as_secs_f64() / total_seconds) as f32;
                        gate.offer(fraction);
                        self.state = SessionState::Running {
                            progress: gate.fraction(),
                        };
                    }
                }
                TrackEvent::Finished { kind } => {
                    log::debug!("{kind:?} track finished");
                    pending_tracks -= 1;
                }
                TrackEvent::Failed { kind, error } => {
                    pending_tracks -= 1;
                    if terminal.is_none() {
                        // First failure wins and tears down the sibling: a
                        // container with one track's data and no counterpart
                        // is not a useful artifact.
                        log::warn!("{kind:?} track failed: {error}");
                        terminal = Some(error);
                        self.cancel.cancel();
                    }
                }
                TrackEvent::Cancelled { kind } => {
                    log::debug!("{kind:?} track observed cancellation");
                    pending_tracks -= 1;
                    if terminal.is_none() && self.cancel.is_cancelled() {
                        terminal = Some(RecompressError::Cancelled);
                    }
                }
            }
        }

        match terminal {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Spawn the pull loop for one track.
fn spawn_track_loop<S, K>(
    kind: MediaKind,
    source: S,
    sink: K,
    cancel: CancellationToken,
    events: Sender<TrackEvent>,
) -> thread::JoinHandle<()>
where
    S: TrackSource + Send + 'static,
    K: TrackSink + Send + 'static,
{
    thread::spawn(move || drive_track(kind, source, sink, cancel, &events))
}

/// The per-track pull loop: while the sink is ready, pull and submit; on
/// end of stream, mark the sink finished.
///
/// Within one track, samples reach the sink in exactly the order they were
/// pulled. The loop yields to the scheduler whenever the sink applies
/// backpressure, and checks the cancellation token once per iteration.
fn drive_track<S: TrackSource, K: TrackSink>(
    kind: MediaKind,
    mut source: S,
    mut sink: K,
    cancel: CancellationToken,
    events: &Sender<TrackEvent>,
) {
    loop {
        if cancel.is_cancelled() {
            source.close();
            let _ = events.send(TrackEvent::Cancelled { kind });
            return;
        }

        if !sink.is_ready_for_more_input() {
            thread::park_timeout(NOT_READY_BACKOFF);
            continue;
        }

        match source.next_sample() {
            Ok(Some(sample)) => {
                let pts = sample.pts;
                if let Err(error) = sink.submit(sample) {
                    source.close();
                    let _ = events.send(TrackEvent::Failed { kind, error });
                    return;
                }
                let _ = events.send(TrackEvent::Advanced { kind, pts });
            }
            Ok(None) => {
                source.close();
                let event = match sink.mark_finished() {
                    Ok(()) => TrackEvent::Finished { kind },
                    Err(error) => TrackEvent::Failed { kind, error },
                };
                let _ = events.send(event);
                return;
            }
            Err(error) => {
                source.close();
                let _ = events.send(TrackEvent::Failed { kind, error });
                return;
            }
        }
    }
}

/// Delete the artifact at `path`, treating "already absent" as success.
fn remove_artifact(path: &Path) -> Result<(), RecompressError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}
