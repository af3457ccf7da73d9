//! Batch configuration.
//!
//! [`BatchConfig`] is a builder that carries every path, tool location and
//! tuning knob the batch pipeline needs, so nothing is read from globals.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vqscore::{BatchConfig, ReportLayout};
//!
//! let config = BatchConfig::new()
//!     .with_input_dir("videos/input")
//!     .with_output_dir("videos/output")
//!     .with_scratch_dir("vmaf_log")
//!     .with_report_path("results.csv")
//!     .with_model_path("/usr/share/model/vmaf_v0.6.1.json")
//!     .with_timeout(Some(Duration::from_secs(600)))
//!     .with_layout(ReportLayout::PerChannel);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ScoreError;

/// Which quality columns the report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportLayout {
    /// Separate VMAF and PSNR runs; one averaged PSNR column plus bitrate.
    /// This is the default.
    #[default]
    Aggregate,
    /// A single libvmaf run with the PSNR feature enabled; one column per
    /// PSNR channel (Y, Cb, Cr).
    PerChannel,
}

/// Target settings for the transcode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSettings {
    /// ffmpeg video encoder name, passed to `-c:v`.
    pub codec: String,
    /// Target bitrate, passed to `-b:v` (e.g. `1000k`).
    pub bitrate: String,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            bitrate: "1000k".to_string(),
        }
    }
}

/// External tool locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Transcoder and metric tool. Defaults to `ffmpeg` on `PATH`.
    pub ffmpeg: PathBuf,
    /// Probing tool. Defaults to `ffprobe` on `PATH`.
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Configuration for a batch run.
///
/// All fields have defaults that mirror a working-directory layout of
/// `./videos/input`, `./videos/output`, `./vmaf_log` and `./results.csv`.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub(crate) input_dir: PathBuf,
    pub(crate) output_dir: PathBuf,
    pub(crate) scratch_dir: PathBuf,
    pub(crate) report_path: PathBuf,
    pub(crate) model_path: PathBuf,
    pub(crate) tools: ToolPaths,
    pub(crate) transcode: TranscodeSettings,
    /// Per external call. `None` waits forever.
    pub(crate) timeout: Option<Duration>,
    pub(crate) kill_tree: bool,
    pub(crate) cpu_sample_interval: Duration,
    pub(crate) layout: ReportLayout,
    pub(crate) detailed: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            input_dir: PathBuf::from("videos/input"),
            output_dir: PathBuf::from("videos/output"),
            scratch_dir: PathBuf::from("vmaf_log"),
            report_path: PathBuf::from("results.csv"),
            model_path: PathBuf::from("vmaf_v0.6.1.json"),
            tools: ToolPaths::default(),
            transcode: TranscodeSettings::default(),
            timeout: None,
            kill_tree: true,
            cpu_sample_interval: Duration::from_secs(1),
            layout: ReportLayout::Aggregate,
            detailed: false,
        }
    }

    /// Directory whose regular files are the reference videos.
    #[must_use]
    pub fn with_input_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_dir = path.into();
        self
    }

    /// Directory that receives the transcoded videos (same file names).
    #[must_use]
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Directory for transient metric logs.
    #[must_use]
    pub fn with_scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.scratch_dir = path.into();
        self
    }

    /// Path of the CSV report. The file is truncated at the start of a run.
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    /// Path of the libvmaf model file.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Location of the `ffmpeg` binary.
    #[must_use]
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools.ffmpeg = path.into();
        self
    }

    /// Location of the `ffprobe` binary.
    #[must_use]
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools.ffprobe = path.into();
        self
    }

    /// Encoder settings for the transcode step.
    #[must_use]
    pub fn with_transcode(mut self, settings: TranscodeSettings) -> Self {
        self.transcode = settings;
        self
    }

    /// Timeout applied to every external tool invocation.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a timed-out tool's descendant processes are killed too.
    /// Defaults to `true`.
    #[must_use]
    pub fn with_kill_tree(mut self, kill_tree: bool) -> Self {
        self.kill_tree = kill_tree;
        self
    }

    /// How often CPU utilization is sampled during a transcode.
    ///
    /// Clamped to a minimum of 10 ms.
    #[must_use]
    pub fn with_cpu_sample_interval(mut self, interval: Duration) -> Self {
        self.cpu_sample_interval = interval.max(Duration::from_millis(10));
        self
    }

    /// Report column layout.
    #[must_use]
    pub fn with_layout(mut self, layout: ReportLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Emit standard deviation and percentile columns next to each mean.
    #[must_use]
    pub fn with_detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub fn transcode(&self) -> &TranscodeSettings {
        &self.transcode
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn kill_tree(&self) -> bool {
        self.kill_tree
    }

    pub fn cpu_sample_interval(&self) -> Duration {
        self.cpu_sample_interval
    }

    pub fn layout(&self) -> ReportLayout {
        self.layout
    }

    pub fn detailed(&self) -> bool {
        self.detailed
    }

    /// Reject configurations the batch cannot run with.
    ///
    /// Checks only what can be decided without touching the filesystem
    /// beyond the input directory; tool availability is covered by
    /// [`validate_environment`](crate::validate_environment).
    pub fn validate(&self) -> Result<(), ScoreError> {
        if !self.input_dir.is_dir() {
            return Err(ScoreError::InvalidConfig(format!(
                "input directory does not exist: {}",
                self.input_dir.display()
            )));
        }
        if self.input_dir == self.output_dir {
            return Err(ScoreError::InvalidConfig(
                "output directory must differ from the input directory".to_string(),
            ));
        }
        if self.transcode.codec.trim().is_empty() {
            return Err(ScoreError::InvalidConfig("codec must not be empty".to_string()));
        }
        if self.transcode.bitrate.trim().is_empty() {
            return Err(ScoreError::InvalidConfig(
                "bitrate must not be empty".to_string(),
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ScoreError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
