//! CSV result report.
//!
//! One row per input video. Metric cells hold the mean of the metric's
//! series; a metric that could not be computed is written as an empty cell.
//! With `detailed` output every summarized column `X` is followed by
//! `X-std`, `X-pct0`, `X-pct10`, `X-pct50` and `X-pct90`.
//!
//! # Example
//!
//! ```no_run
//! use vqscore::{ReportLayout, ReportWriter, ResultRow};
//!
//! let mut writer = ReportWriter::create("results.csv", ReportLayout::Aggregate, false)?;
//! writer.write_row(&ResultRow::new("clip.mp4"))?;
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::config::ReportLayout;
use crate::error::ScoreError;
use crate::statistics::StatSummary;

const DETAIL_SUFFIXES: [&str; 5] = ["std", "pct0", "pct10", "pct50", "pct90"];

/// Measurements for one video. `None` means "not computed".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultRow {
    /// File name of the reference video.
    pub name: String,
    /// VMAF over the frames of the transcoded video.
    pub vmaf: Option<StatSummary>,
    /// Average-plane PSNR (aggregate layout).
    pub psnr: Option<StatSummary>,
    /// Per-plane PSNR (per-channel layout).
    pub psnr_y: Option<StatSummary>,
    /// See [`psnr_y`](ResultRow::psnr_y).
    pub psnr_cb: Option<StatSummary>,
    /// See [`psnr_y`](ResultRow::psnr_y).
    pub psnr_cr: Option<StatSummary>,
    /// Instantaneous bitrate windows, in kbps.
    pub bitrate: Option<StatSummary>,
    /// Transcoded file size in bytes.
    pub size: Option<u64>,
    /// Mean system CPU utilization during the transcode, in percent.
    pub cpu_usage: Option<f64>,
}

impl ResultRow {
    /// A row with only the name filled in.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Column names for `layout`.
pub fn report_headers(layout: ReportLayout, detailed: bool) -> Vec<String> {
    let mut headers = vec!["Video Name".to_string()];
    let metrics: &[&str] = match layout {
        ReportLayout::Aggregate => &["VMAF", "PSNR", "bitrate"],
        ReportLayout::PerChannel => &["VMAF", "PSNR_Y", "PSNR_CB", "PSNR_CR"],
    };
    for metric in metrics {
        headers.push((*metric).to_string());
        if detailed {
            headers.extend(DETAIL_SUFFIXES.iter().map(|suffix| format!("{metric}-{suffix}")));
        }
    }
    if detailed && layout == ReportLayout::Aggregate {
        headers.push("Size".to_string());
    }
    headers.push("CPU Usage".to_string());
    headers
}

fn push_summary(record: &mut Vec<String>, summary: Option<&StatSummary>, detailed: bool) {
    record.push(summary.map(|s| s.mean.to_string()).unwrap_or_default());
    if !detailed {
        return;
    }
    match summary {
        Some(s) => record.extend(
            [s.stddev, s.p0, s.p10, s.p50, s.p90]
                .iter()
                .map(f64::to_string),
        ),
        None => record.extend(std::iter::repeat_n(String::new(), DETAIL_SUFFIXES.len())),
    }
}

/// Cells of `row` in `layout` column order.
pub fn report_record(row: &ResultRow, layout: ReportLayout, detailed: bool) -> Vec<String> {
    let mut record = vec![row.name.clone()];
    push_summary(&mut record, row.vmaf.as_ref(), detailed);
    match layout {
        ReportLayout::Aggregate => {
            push_summary(&mut record, row.psnr.as_ref(), detailed);
            push_summary(&mut record, row.bitrate.as_ref(), detailed);
            if detailed {
                record.push(row.size.map(|s| s.to_string()).unwrap_or_default());
            }
        }
        ReportLayout::PerChannel => {
            push_summary(&mut record, row.psnr_y.as_ref(), detailed);
            push_summary(&mut record, row.psnr_cb.as_ref(), detailed);
            push_summary(&mut record, row.psnr_cr.as_ref(), detailed);
        }
    }
    record.push(row.cpu_usage.map(|c| c.to_string()).unwrap_or_default());
    record
}

/// Streams result rows into a CSV sink, flushing after each row.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
    layout: ReportLayout,
    detailed: bool,
    rows: usize,
}

impl ReportWriter<File> {
    /// Create (truncate) the report at `path` and write the header.
    ///
    /// # Errors
    ///
    /// [`ScoreError::CsvError`] if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(
        path: P,
        layout: ReportLayout,
        detailed: bool,
    ) -> Result<Self, ScoreError> {
        let writer = csv::Writer::from_path(path)?;
        Self::with_writer(writer, layout, detailed)
    }
}

impl<W: Write> ReportWriter<W> {
    /// Write the header to an arbitrary sink.
    ///
    /// # Errors
    ///
    /// [`ScoreError::CsvError`] if the header cannot be written.
    pub fn from_writer(sink: W, layout: ReportLayout, detailed: bool) -> Result<Self, ScoreError> {
        Self::with_writer(csv::Writer::from_writer(sink), layout, detailed)
    }

    fn with_writer(
        mut writer: csv::Writer<W>,
        layout: ReportLayout,
        detailed: bool,
    ) -> Result<Self, ScoreError> {
        writer.write_record(report_headers(layout, detailed))?;
        writer.flush()?;
        Ok(Self {
            writer,
            layout,
            detailed,
            rows: 0,
        })
    }

    /// Append one row and flush it.
    ///
    /// # Errors
    ///
    /// [`ScoreError::CsvError`] or [`ScoreError::IoError`] on write failure.
    pub fn write_row(&mut self, row: &ResultRow) -> Result<(), ScoreError> {
        self.writer
            .write_record(report_record(row, self.layout, self.detailed))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, excluding the header.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flush and return the underlying sink.
    ///
    /// # Errors
    ///
    /// [`ScoreError::IoError`] if the final flush fails.
    pub fn into_inner(self) -> Result<W, ScoreError> {
        self.writer
            .into_inner()
            .map_err(|error| ScoreError::IoError(error.into_error()))
    }
}
