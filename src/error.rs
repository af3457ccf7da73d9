//! Error types for the `vqscore` crate.
//!
//! This module defines [`ScoreError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry the command, file path, or
//! metric involved so that the batch log can name the offending video.
//!
//! Some variants describe per-video "soft" failures (a tool exited non-zero,
//! a log file was never written, a series came out empty) that the batch
//! orchestrator records and moves past. The rest abort the whole batch; see
//! [`ScoreError::is_fatal`].

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use thiserror::Error;

/// The unified error type for all `vqscore` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScoreError {
    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A JSON payload (probe output or metric log) could not be parsed.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The CSV report could not be written.
    #[error("CSV report error: {0}")]
    CsvError(#[from] csv::Error),

    /// An external tool could not be started at all.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: IoError,
    },

    /// An external tool exited with a non-zero status.
    #[error("Command failed with exit code {exit_code}: {command}: {stderr}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit code reported by the child.
        exit_code: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// An external tool did not finish before its deadline and was killed.
    #[error("Command timed out after {timeout:?}: {command}")]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Timeout that expired.
        timeout: Duration,
    },

    /// The metric tool ran but never produced its log file.
    #[error("Metric log was not produced: {0}")]
    MissingLog(PathBuf),

    /// The probe returned no packets for the file.
    #[error("No packets reported for {0}")]
    NoPackets(PathBuf),

    /// A required field is absent from the probe output.
    #[error("Probe output for {path} has no `{field}` field")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// File that was probed.
        path: PathBuf,
    },

    /// A numeric series was empty, so no summary can be computed.
    #[error("Cannot summarize an empty {metric} series")]
    EmptySeries {
        /// The metric the series belongs to.
        metric: String,
    },

    /// The transcode step failed for an input.
    #[error("Transcode of {input} failed: {reason}")]
    TranscodeFailed {
        /// Input video that was being transcoded.
        input: PathBuf,
        /// Why the transcode is considered failed.
        reason: String,
    },

    /// The batch configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ScoreError {
    /// Returns `true` if this error, raised while processing one video,
    /// should abort the whole batch rather than just that video's metric.
    ///
    /// A tool that cannot be spawned will fail the same way for every
    /// input, and a broken report cannot record anything further.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScoreError::CsvError(_) | ScoreError::Spawn { .. } | ScoreError::InvalidConfig(_)
        )
    }

    pub(crate) fn empty_series(metric: impl Into<String>) -> Self {
        ScoreError::EmptySeries {
            metric: metric.into(),
        }
    }
}
