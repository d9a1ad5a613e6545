//! Progress, status and outcome reporting for conversion jobs.
//!
//! A job writes [`ConversionEvent`]s to a [`ProgressSink`]. The usual sink is
//! the sending half of [`event_channel`]; the UI layer drains the receiver at
//! its own pace. Emitting never blocks the job.
//!
//! # Event order
//!
//! Events arrive in the order the work happened: per-page outcomes and
//! progress values follow input order, progress never decreases, and
//! [`ConversionEvent::Finished`] is always the last event of a job, sent
//! after the working directory has been released.
//!
//! # Example
//!
//! ```rust
//! use pagebind::progress::{ConversionEvent, ProgressSink, event_channel};
//!
//! let (tx, mut rx) = event_channel();
//! tx.emit(ConversionEvent::Progress(40));
//! assert_eq!(rx.try_recv().unwrap(), ConversionEvent::Progress(40));
//! ```

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::types::{FileFormat, JobReport, PageOutcome};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything a job reports to the outside world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConversionEvent {
    /// Overall completion in percent, 0 to 100.
    Progress(u8),
    /// Human-readable description of the current phase.
    Status(String),
    /// One input image was converted or skipped.
    Page(PageOutcome),
    /// The job ended. Always the last event.
    Finished(JobReport),
}

/// Receives job events.
///
/// Implementations must return quickly; the job calls `emit` inline between
/// units of work.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ConversionEvent);
}

impl ProgressSink for UnboundedSender<ConversionEvent> {
    fn emit(&self, event: ConversionEvent) {
        // A dropped receiver means nobody is listening; the job carries on.
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(ConversionEvent) + Send + Sync,
{
    fn emit(&self, event: ConversionEvent) {
        (self.0)(event)
    }
}

/// A sink that discards every event.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ConversionEvent) {}
}

/// Convenience alias for the sink stored in a job.
pub type SharedSink = Arc<dyn ProgressSink>;

/// Creates an unbounded, non-blocking event channel.
pub fn event_channel() -> (
    UnboundedSender<ConversionEvent>,
    UnboundedReceiver<ConversionEvent>,
) {
    unbounded_channel()
}

/// Share of the bar reached once the package is about to be written (EPUB only).
pub(crate) const EPUB_WRITE_PROGRESS: u8 = 90;

/// Stateful front end to a sink that enforces monotonic, staged progress.
pub(crate) struct Reporter {
    sink: SharedSink,
    format: FileFormat,
    last_progress: u8,
}

impl Reporter {
    pub(crate) fn new(sink: SharedSink, format: FileFormat) -> Self {
        Self {
            sink,
            format,
            last_progress: 0,
        }
    }

    /// Progress after `done` of `total` images have been attempted.
    ///
    /// Maps linearly onto `0..=80` for CBZ and `0..=60` for EPUB.
    pub(crate) fn staged_percent(format: FileFormat, done: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        let ceiling = format.processing_ceiling() as usize;
        (done.min(total) * ceiling / total) as u8
    }

    pub(crate) fn image_processed(&mut self, done: usize, total: usize) {
        self.progress(Self::staged_percent(self.format, done, total));
    }

    /// Emits `percent`, clamped to 100 and never below the last value sent.
    pub(crate) fn progress(&mut self, percent: u8) {
        let percent = percent.min(100).max(self.last_progress);
        self.last_progress = percent;
        self.sink.emit(ConversionEvent::Progress(percent));
    }

    pub(crate) fn status(&self, text: impl Into<String>) {
        self.sink.emit(ConversionEvent::Status(text.into()));
    }

    pub(crate) fn page(&self, outcome: PageOutcome) {
        self.sink.emit(ConversionEvent::Page(outcome));
    }

    pub(crate) fn finished(self, report: JobReport) {
        self.sink.emit(ConversionEvent::Finished(report));
    }
}
