//! Batch orchestration.
//!
//! [`BatchRunner`] processes every regular file of the input directory, in
//! file-name order, through the same pipeline:
//!
//! 1. Transcode to the output directory while sampling CPU.
//! 2. PSNR against the reference.
//! 3. VMAF against the reference.
//! 4. Bitrate windows of the transcoded file.
//! 5. Append the row to the report.
//!
//! In the [`PerChannel`](ReportLayout::PerChannel) layout steps 2 and 3 are
//! one libvmaf run with its PSNR feature, and step 4 is skipped since that
//! layout has no bitrate column.
//!
//! Failures of individual metrics are logged, counted in the
//! [`BatchSummary`], and leave that metric's cells empty. A failed
//! transcode skips the metrics for that video. Errors that would fail the
//! same way for every video ([`ScoreError::is_fatal`]) abort the batch.
//!
//! # Example
//!
//! ```no_run
//! use vqscore::{BatchConfig, BatchRunner};
//!
//! let config = BatchConfig::new().with_model_path("/usr/share/model/vmaf_v0.6.1.json");
//! let summary = BatchRunner::new(config).run()?;
//! println!("{} rows, {} failures", summary.rows.len(), summary.failures.len());
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::bitrate::analyze_bitrate;
use crate::config::{BatchConfig, ReportLayout};
use crate::cpu::{CpuSampler, ProcStatSampler};
use crate::error::ScoreError;
use crate::probe::Prober;
use crate::progress::{BatchStage, NoOpProgress, ProgressCallback, ProgressTracker};
use crate::quality::QualityAnalyzer;
use crate::report::{ReportWriter, ResultRow};
use crate::runner::CommandRunner;
use crate::transcode::Transcoder;

/// Builds a fresh CPU sampler for each transcode.
pub type CpuSamplerFactory = Arc<dyn Fn() -> Box<dyn CpuSampler> + Send + Sync>;

/// A per-video failure that left cells empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFailure {
    /// File name of the reference video.
    pub video: String,
    /// Pipeline step that failed (`transcode`, `psnr`, `vmaf`, `bitrate`).
    pub step: &'static str,
    /// Rendered error.
    pub message: String,
}

/// Result of a completed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Rows in the order they were written.
    pub rows: Vec<ResultRow>,
    /// Soft failures, in the order they happened.
    pub failures: Vec<VideoFailure>,
}

/// Regular files of `dir`, sorted by file name.
///
/// # Errors
///
/// [`ScoreError::IoError`] if the directory cannot be read.
pub fn list_inputs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, ScoreError> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() {
            inputs.push(path);
        }
    }
    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(inputs)
}

/// Runs the per-video pipeline over an input directory.
pub struct BatchRunner {
    config: BatchConfig,
    progress: Arc<dyn ProgressCallback>,
    cpu_sampler: CpuSamplerFactory,
}

impl BatchRunner {
    /// A runner with no progress callback and the `/proc/stat` sampler.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoOpProgress),
            cpu_sampler: Arc::new(|| Box::new(ProcStatSampler::new()) as Box<dyn CpuSampler>),
        }
    }

    /// Receive a snapshot at every stage change.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Replace the CPU sampler used during transcodes.
    #[must_use]
    pub fn with_cpu_sampler<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CpuSampler> + Send + Sync + 'static,
    {
        self.cpu_sampler = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process every input and write the report.
    ///
    /// The report is truncated and its header written before the first
    /// video; each row is flushed as soon as it is complete.
    ///
    /// # Errors
    ///
    /// Invalid configuration, an unreadable input directory, directory
    /// creation or report I/O failures, and any fatal per-video error.
    pub fn run(&self) -> Result<BatchSummary, ScoreError> {
        let config = &self.config;
        config.validate()?;

        let inputs = list_inputs(config.input_dir())?;
        fs::create_dir_all(config.output_dir())?;
        fs::create_dir_all(config.scratch_dir())?;

        let mut writer = ReportWriter::create(config.report_path(), config.layout(), config.detailed())?;
        let pipeline = Pipeline::new(config);
        let mut tracker = ProgressTracker::new(self.progress.clone(), inputs.len() as u64);
        let mut summary = BatchSummary::default();

        log::info!(
            "Processing {} video(s) from {}",
            inputs.len(),
            config.input_dir().display()
        );

        for input in &inputs {
            let name = file_name(input);
            let row = pipeline.process_video(
                input,
                &name,
                self.cpu_sampler.as_ref(),
                &tracker,
                &mut summary.failures,
            )?;

            tracker.stage(&name, BatchStage::WritingRow);
            writer.write_row(&row)?;
            log_row(&row);
            summary.rows.push(row);
            tracker.advance(&name);
        }

        writer.into_inner()?;
        log::info!(
            "Wrote {} row(s) to {} ({} failure(s))",
            summary.rows.len(),
            config.report_path().display(),
            summary.failures.len()
        );
        Ok(summary)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn log_row(row: &ResultRow) {
    let cell = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    log::info!(
        "{}: VMAF {} PSNR {} bitrate {} kbps CPU {}%",
        row.name,
        cell(row.vmaf.map(|s| s.mean)),
        cell(row.psnr.or(row.psnr_y).map(|s| s.mean)),
        cell(row.bitrate.map(|s| s.mean)),
        cell(row.cpu_usage),
    );
}

/// Tools configured for one batch.
struct Pipeline<'a> {
    config: &'a BatchConfig,
    transcoder: Transcoder,
    analyzer: QualityAnalyzer,
    prober: Prober,
}

impl<'a> Pipeline<'a> {
    fn new(config: &'a BatchConfig) -> Self {
        let runner = CommandRunner::new()
            .with_timeout(config.timeout())
            .with_kill_tree(config.kill_tree());
        let tools = config.tools();
        Self {
            config,
            transcoder: Transcoder::new(&tools.ffmpeg, runner.clone(), config.transcode().clone()),
            analyzer: QualityAnalyzer::new(&tools.ffmpeg, runner.clone())
                .with_model_path(config.model_path()),
            prober: Prober::new(&tools.ffprobe, runner),
        }
    }

    fn process_video(
        &self,
        input: &Path,
        name: &str,
        sampler: &(dyn Fn() -> Box<dyn CpuSampler> + Send + Sync),
        tracker: &ProgressTracker,
        failures: &mut Vec<VideoFailure>,
    ) -> Result<ResultRow, ScoreError> {
        let mut row = ResultRow::new(name);
        let output = self.config.output_dir().join(name);

        tracker.stage(name, BatchStage::Transcoding);
        let transcode = self.transcoder.run(
            input,
            &output,
            sampler(),
            self.config.cpu_sample_interval(),
        );
        let Some(report) = soft(transcode, name, "transcode", failures)? else {
            return Ok(row);
        };
        row.cpu_usage = Some(report.cpu.average);
        if soft(report.check(input), name, "transcode", failures)?.is_none() {
            return Ok(row);
        }

        let scratch = self.config.scratch_dir();
        let vmaf_log = scratch.join(format!("{name}_vmaf.json"));

        match self.config.layout() {
            ReportLayout::Aggregate => {
                tracker.stage(name, BatchStage::Psnr);
                let psnr_log = scratch.join(format!("{name}_psnr.log"));
                let psnr = self.analyzer.psnr(&output, input, &psnr_log);
                row.psnr = soft(psnr, name, "psnr", failures)?.map(|r| r.summary);

                tracker.stage(name, BatchStage::Vmaf);
                let vmaf = self.analyzer.vmaf(&output, input, &vmaf_log);
                row.vmaf = soft(vmaf, name, "vmaf", failures)?.map(|r| r.summary);

                tracker.stage(name, BatchStage::Bitrate);
                let bitrate = analyze_bitrate(&self.prober, &output);
                if let Some(bitrate) = soft(bitrate, name, "bitrate", failures)? {
                    row.bitrate = Some(bitrate.summary);
                    row.size = Some(bitrate.size);
                }
            }
            ReportLayout::PerChannel => {
                tracker.stage(name, BatchStage::Vmaf);
                let channels = self.analyzer.vmaf_with_channel_psnr(&output, input, &vmaf_log);
                if let Some(channels) = soft(channels, name, "vmaf", failures)? {
                    row.vmaf = Some(channels.vmaf.summary);
                    row.psnr_y = Some(channels.psnr_y.summary);
                    row.psnr_cb = Some(channels.psnr_cb.summary);
                    row.psnr_cr = Some(channels.psnr_cr.summary);
                }
            }
        }

        Ok(row)
    }
}

/// Record a per-video failure and carry on, or propagate a fatal one.
fn soft<T>(
    result: Result<T, ScoreError>,
    video: &str,
    step: &'static str,
    failures: &mut Vec<VideoFailure>,
) -> Result<Option<T>, ScoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_fatal() => Err(error),
        Err(error) => {
            log::error!("{video}: {step} failed: {error}");
            failures.push(VideoFailure {
                video: video.to_string(),
                step,
                message: error.to_string(),
            });
            Ok(None)
        }
    }
}
