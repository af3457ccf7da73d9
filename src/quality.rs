//! Full-reference quality metrics computed by ffmpeg.
//!
//! [`QualityAnalyzer`] runs ffmpeg with the distorted video as the first
//! input and the reference as the second, scales the reference to the
//! distorted resolution with `scale2ref`, and lets a metric filter write a
//! per-frame log into the scratch directory. The log is parsed into a
//! series of [`FrameMetric`] values, deleted, and summarized.
//!
//! Three runs are available:
//!
//! - [`QualityAnalyzer::vmaf`]: libvmaf, JSON log.
//! - [`QualityAnalyzer::psnr`]: the `psnr` filter, text stats file.
//! - [`QualityAnalyzer::vmaf_with_channel_psnr`]: libvmaf with its PSNR
//!   feature, giving VMAF and PSNR Y/Cb/Cr from a single pass.
//!
//! # Example
//!
//! ```no_run
//! use vqscore::{CommandRunner, QualityAnalyzer};
//!
//! let analyzer = QualityAnalyzer::new("ffmpeg", CommandRunner::new());
//! let report = analyzer.psnr("out.mp4", "in.mp4", "scratch/in.mp4_psnr.log")?;
//! println!("PSNR {:.2} dB over {} frames", report.summary.mean, report.frames.len());
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::ScoreError;
use crate::psnr::parse_psnr_stats;
use crate::runner::CommandRunner;
use crate::statistics::{StatSummary, summarize};
use crate::vmaf::{parse_vmaf_channels, parse_vmaf_log};

/// Which metric a series holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    Vmaf,
    /// Average PSNR over the three planes.
    Psnr,
    PsnrY,
    PsnrCb,
    PsnrCr,
}

impl QualityMetric {
    /// Short lowercase name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            QualityMetric::Vmaf => "vmaf",
            QualityMetric::Psnr => "psnr",
            QualityMetric::PsnrY => "psnr_y",
            QualityMetric::PsnrCb => "psnr_cb",
            QualityMetric::PsnrCr => "psnr_cr",
        }
    }
}

impl Display for QualityMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// One per-frame score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameMetric {
    /// Frame number as reported by the tool.
    pub index: u64,
    /// Score for this frame.
    pub value: f64,
}

/// Per-frame series for one metric and its summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// Metric the frames were scored with.
    pub metric: QualityMetric,
    /// Per-frame scores in log order.
    pub frames: Vec<FrameMetric>,
    /// Statistics over `frames`.
    pub summary: StatSummary,
}

impl QualityReport {
    /// Summarize `frames` into a report.
    ///
    /// # Errors
    ///
    /// [`ScoreError::EmptySeries`] if `frames` is empty.
    pub fn from_frames(metric: QualityMetric, frames: Vec<FrameMetric>) -> Result<Self, ScoreError> {
        let values: Vec<f64> = frames.iter().map(|frame| frame.value).collect();
        let summary = summarize(metric.name(), &values)?;
        Ok(Self {
            metric,
            frames,
            summary,
        })
    }
}

/// Result of the combined libvmaf + PSNR run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    /// VMAF score per frame.
    pub vmaf: QualityReport,
    /// Luma PSNR.
    pub psnr_y: QualityReport,
    /// Blue-difference chroma PSNR.
    pub psnr_cb: QualityReport,
    /// Red-difference chroma PSNR.
    pub psnr_cr: QualityReport,
}

/// Escape a value for use inside an ffmpeg filter option.
///
/// ffmpeg unescapes twice: once when splitting the graph into filters and
/// once when splitting a filter's arguments into options. The value is
/// escaped for the option level first, then for the graph level.
pub fn escape_filter_value(value: &str) -> String {
    escape_chars(&escape_chars(value, &['\\', '\'', ':']), &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Filter graph for a libvmaf run logging JSON to `log_path`.
pub fn vmaf_filter_graph(log_path: &Path, model_path: &Path) -> String {
    format!(
        "scale2ref[main][ref];[main][ref]libvmaf=log_fmt=json:log_path={}:model=path={}:shortest=1",
        escape_filter_value(&log_path.to_string_lossy()),
        escape_filter_value(&model_path.to_string_lossy()),
    )
}

/// Filter graph for a psnr run writing its stats file to `log_path`.
pub fn psnr_filter_graph(log_path: &Path) -> String {
    format!(
        "scale2ref[main][ref];[main][ref]psnr=stats_file={}:shortest=1",
        escape_filter_value(&log_path.to_string_lossy()),
    )
}

/// Filter graph for a libvmaf run that also computes per-plane PSNR.
pub fn vmaf_channel_psnr_filter_graph(log_path: &Path, model_path: &Path) -> String {
    format!(
        "scale2ref=flags=bicubic[main][ref];[main][ref]libvmaf=feature=name=psnr:shortest=1:log_fmt=json:log_path={}:model=path={}",
        escape_filter_value(&log_path.to_string_lossy()),
        escape_filter_value(&model_path.to_string_lossy()),
    )
}

/// Runs ffmpeg metric filters and parses their logs.
#[derive(Debug, Clone)]
pub struct QualityAnalyzer {
    ffmpeg: PathBuf,
    runner: CommandRunner,
    model_path: PathBuf,
}

impl QualityAnalyzer {
    /// Create an analyzer for the given ffmpeg binary.
    ///
    /// The VMAF model defaults to `vmaf_v0.6.1.json`; set it with
    /// [`with_model_path`](QualityAnalyzer::with_model_path).
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
            model_path: PathBuf::from("vmaf_v0.6.1.json"),
        }
    }

    /// Path of the libvmaf model file.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// The ffmpeg command comparing `distorted` against `reference` through
    /// `filter_graph`.
    pub fn command(&self, distorted: &Path, reference: &Path, filter_graph: &str) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .arg("-i")
            .arg(distorted)
            .arg("-i")
            .arg(reference)
            .arg("-lavfi")
            .arg(filter_graph)
            .args(["-f", "null", "-"]);
        command
    }

    /// Per-frame VMAF of `distorted` against `reference`.
    ///
    /// # Errors
    ///
    /// [`ScoreError::MissingLog`] if ffmpeg produced no log, JSON errors if
    /// the log is malformed, [`ScoreError::EmptySeries`] if it has no frames.
    pub fn vmaf<P, Q, L>(&self, distorted: P, reference: Q, log_path: L) -> Result<QualityReport, ScoreError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        L: AsRef<Path>,
    {
        let log_path = log_path.as_ref();
        let graph = vmaf_filter_graph(log_path, &self.model_path);
        let contents = self.run_and_collect(distorted.as_ref(), reference.as_ref(), &graph, log_path)?;
        let frames = parse_vmaf_log(&contents)?;
        QualityReport::from_frames(QualityMetric::Vmaf, frames)
    }

    /// Per-frame average PSNR of `distorted` against `reference`.
    ///
    /// # Errors
    ///
    /// [`ScoreError::MissingLog`] if ffmpeg produced no stats file,
    /// [`ScoreError::EmptySeries`] if no frame had a finite value.
    pub fn psnr<P, Q, L>(&self, distorted: P, reference: Q, log_path: L) -> Result<QualityReport, ScoreError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        L: AsRef<Path>,
    {
        let log_path = log_path.as_ref();
        let graph = psnr_filter_graph(log_path);
        let contents = self.run_and_collect(distorted.as_ref(), reference.as_ref(), &graph, log_path)?;
        let frames = parse_psnr_stats(&contents);
        QualityReport::from_frames(QualityMetric::Psnr, frames)
    }

    /// VMAF and per-plane PSNR from one libvmaf pass.
    ///
    /// # Errors
    ///
    /// As for [`vmaf`](QualityAnalyzer::vmaf); every channel must have at
    /// least one finite value.
    pub fn vmaf_with_channel_psnr<P, Q, L>(
        &self,
        distorted: P,
        reference: Q,
        log_path: L,
    ) -> Result<ChannelReport, ScoreError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        L: AsRef<Path>,
    {
        let log_path = log_path.as_ref();
        let graph = vmaf_channel_psnr_filter_graph(log_path, &self.model_path);
        let contents = self.run_and_collect(distorted.as_ref(), reference.as_ref(), &graph, log_path)?;
        let channels = parse_vmaf_channels(&contents)?;
        Ok(ChannelReport {
            vmaf: QualityReport::from_frames(QualityMetric::Vmaf, channels.vmaf)?,
            psnr_y: QualityReport::from_frames(QualityMetric::PsnrY, channels.psnr_y)?,
            psnr_cb: QualityReport::from_frames(QualityMetric::PsnrCb, channels.psnr_cb)?,
            psnr_cr: QualityReport::from_frames(QualityMetric::PsnrCr, channels.psnr_cr)?,
        })
    }

    /// Clear any stale log, run ffmpeg, and return the fresh log's contents.
    ///
    /// The log is removed after reading. ffmpeg's exit status is not
    /// checked: the presence of the log decides success.
    fn run_and_collect(
        &self,
        distorted: &Path,
        reference: &Path,
        filter_graph: &str,
        log_path: &Path,
    ) -> Result<String, ScoreError> {
        remove_if_present(log_path)?;

        let mut command = self.command(distorted, reference, filter_graph);
        let output = self.runner.run(&mut command)?;
        if !output.success() {
            log::warn!(
                "ffmpeg exited with {} for {}: {}",
                output.exit_code,
                distorted.display(),
                output.stderr_text()
            );
        }

        if !log_path.is_file() {
            return Err(ScoreError::MissingLog(log_path.to_path_buf()));
        }
        let contents = fs::read_to_string(log_path);
        remove_if_present(log_path)?;
        Ok(contents?)
    }
}

fn remove_if_present(path: &Path) -> Result<(), ScoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}
