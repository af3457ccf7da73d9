//! Batch progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring a batch run and
//! [`ProgressInfo`] for detailed progress snapshots. The batch emits one
//! snapshot each time it enters a [`BatchStage`] for a video, and one after
//! each video's row is written.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vqscore::{BatchConfig, BatchRunner, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "[{:?}] {} ({}/{})",
//!             info.stage,
//!             info.video.as_deref().unwrap_or("-"),
//!             info.current,
//!             info.total,
//!         );
//!     }
//! }
//!
//! let summary = BatchRunner::new(BatchConfig::new())
//!     .with_progress(Arc::new(PrintProgress))
//!     .run()?;
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The step of the per-video pipeline currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchStage {
    /// Encoding the reference with ffmpeg while CPU is sampled.
    Transcoding,
    /// Computing PSNR.
    Psnr,
    /// Computing VMAF (and per-channel PSNR in that layout).
    Vmaf,
    /// Windowing packet sizes from ffprobe.
    Bitrate,
    /// Appending the row to the report.
    WritingRow,
    /// The video is done.
    Finished,
}

/// A snapshot of batch progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What the batch is doing right now.
    pub stage: BatchStage,
    /// File name of the video being processed.
    pub video: Option<String>,
    /// Videos finished so far.
    pub current: u64,
    /// Videos in the batch.
    pub total: u64,
    /// Completion percentage (0.0 to 100.0).
    pub percentage: f32,
    /// Wall-clock time elapsed since the batch started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on the average time per video.
    pub estimated_remaining: Option<Duration>,
}

/// Trait for receiving progress updates during a batch.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// batch.
pub trait ProgressCallback: Send + Sync {
    /// Called at every stage change.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks batch timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: u64) -> Self {
        Self {
            callback,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Report that `video` entered `stage`.
    pub(crate) fn stage(&self, video: &str, stage: BatchStage) {
        self.report(Some(video), stage);
    }

    /// Record one finished video.
    pub(crate) fn advance(&mut self, video: &str) {
        self.current = (self.current + 1).min(self.total);
        self.report(Some(video), BatchStage::Finished);
    }

    fn report(&self, video: Option<&str>, stage: BatchStage) {
        let elapsed = self.start_time.elapsed();

        let percentage = if self.total > 0 {
            (self.current as f32 / self.total as f32) * 100.0
        } else {
            100.0
        };

        let estimated_remaining = if self.current > 0 {
            let remaining = self.total.saturating_sub(self.current);
            let per_item = elapsed / self.current as u32;
            Some(per_item * remaining as u32)
        } else {
            None
        };

        let info = ProgressInfo {
            stage,
            video: video.map(str::to_string),
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
        };

        self.callback.on_progress(&info);
    }
}
