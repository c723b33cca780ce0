//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for observing a session's
//! fractional completion, [`CancellationToken`] for cooperative
//! cancellation, and [`ProgressGate`], the throttle that decouples report
//! cadence from the pull loops' cadence.
//!
//! # Example
//!
//! ```
//! use recompress::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//!
//! // From another thread (or a signal handler, etc.):
//! token.cancel();
//! assert!(token.is_cancelled());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Minimum interval between two progress reports.
pub(crate) const REPORT_INTERVAL: Duration = Duration::from_millis(50);

/// Trait for receiving progress updates during a transcode session.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks are
/// invoked from the session's driving thread, not the caller's.
///
/// Progress callbacks are infallible — they observe but cannot halt the
/// session. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called with the session's fractional completion in `[0.0, 1.0]`.
    ///
    /// Within one session the reported values are monotonically
    /// non-decreasing and arrive at most every 50 ms.
    fn on_progress(&self, fraction: f32);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _fraction: f32) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation of the associated session. The track loops check
/// [`is_cancelled`](CancellationToken::is_cancelled) before each unit of
/// work, so cancellation is never forced mid-sample.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Throttled, monotonic delivery of progress fractions.
///
/// The gate enforces the two invariants of the progress channel: values
/// never decrease within one session, and reports are spaced at least
/// [`REPORT_INTERVAL`] apart. Out-of-order or too-frequent offers are
/// silently absorbed.
pub struct ProgressGate {
    callback: Arc<dyn ProgressCallback>,
    last_report: Option<Instant>,
    last_fraction: f32,
}

impl ProgressGate {
    /// Create a gate that delivers to `callback`.
    pub fn new(callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            callback,
            last_report: None,
            last_fraction: 0.0,
        }
    }

    /// Offer a new completion fraction.
    ///
    /// Delivers the clamped value when it advances on the last report and
    /// the throttle interval has elapsed; otherwise does nothing.
    pub fn offer(&mut self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= self.last_fraction {
            return;
        }

        let now = Instant::now();
        if let Some(last) = self.last_report
            && now.duration_since(last) < REPORT_INTERVAL
        {
            return;
        }

        self.last_report = Some(now);
        self.last_fraction = fraction;
        self.callback.on_progress(fraction);
    }

    /// The most recently delivered fraction.
    pub fn fraction(&self) -> f32 {
        self.last_fraction
    }
}
