//! # vqscore
//!
//! Batch video quality scoring: transcode a directory of reference videos
//! with ffmpeg, measure how much quality the encode lost, and write one CSV
//! row per video.
//!
//! For every reference the batch records:
//!
//! - **VMAF**: perceptual quality score (0 to 100) from libvmaf
//! - **PSNR**: peak signal-to-noise ratio in dB, averaged over planes or per
//!   Y/Cb/Cr plane
//! - **Bitrate**: instantaneous bitrate over roughly one-second windows of
//!   the transcoded stream's packets
//! - **CPU usage**: system-wide utilization sampled during the encode
//!
//! Each per-frame or per-window series is reduced to mean, standard
//! deviation and the 0th/10th/50th/90th percentiles.
//!
//! All measurement is delegated to the `ffmpeg` and `ffprobe` executables,
//! which are run as child processes with an optional timeout.
//!
//! ## Quick Start
//!
//! ### Run a Batch
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vqscore::{BatchConfig, BatchRunner};
//!
//! let config = BatchConfig::new()
//!     .with_input_dir("videos/input")
//!     .with_output_dir("videos/output")
//!     .with_model_path("vmaf_v0.6.1.json")
//!     .with_timeout(Some(Duration::from_secs(900)));
//! let summary = BatchRunner::new(config).run()?;
//! println!("{} videos scored", summary.rows.len());
//! # Ok::<(), vqscore::ScoreError>(())
//! ```
//!
//! ### Measure One File
//!
//! ```no_run
//! use vqscore::{CommandRunner, Prober, analyze_bitrate};
//!
//! let prober = Prober::new("ffprobe", CommandRunner::new());
//! let report = analyze_bitrate(&prober, "videos/output/clip.mp4")?;
//! println!("mean bitrate {:.1} kbps", report.summary.mean);
//! # Ok::<(), vqscore::ScoreError>(())
//! ```
//!
//! ## Logging
//!
//! The library logs through the [`log`](https://crates.io/crates/log)
//! facade: tool command lines at `debug`, per-video results at `info`,
//! skipped log lines at `warn`, and metric failures at `error`. Install any
//! logger to see them.
//!
//! ## Requirements
//!
//! `ffmpeg` built with libvmaf, `ffprobe`, and a VMAF model file.

pub mod batch;
pub mod bitrate;
pub mod config;
pub mod cpu;
pub mod error;
pub mod packet;
pub mod probe;
pub mod progress;
pub mod psnr;
pub mod quality;
pub mod report;
pub mod runner;
pub mod statistics;
pub mod transcode;
pub mod validation;
pub mod vmaf;

pub use batch::{BatchRunner, BatchSummary, CpuSamplerFactory, VideoFailure, list_inputs};
pub use bitrate::{BitrateReport, BitrateWindow, WINDOW_SECONDS, analyze_bitrate, compute_bitrate_windows};
pub use config::{BatchConfig, ReportLayout, ToolPaths, TranscodeSettings};
pub use cpu::{CpuMonitor, CpuSampler, CpuUsage, ProcStatSampler};
pub use error::ScoreError;
pub use packet::PacketRecord;
pub use probe::{FormatInfo, ProbeOptions, ProbeReport, Prober, StreamInfo, parse_probe_output};
pub use progress::{BatchStage, ProgressCallback, ProgressInfo};
pub use psnr::parse_psnr_stats;
pub use quality::{
    ChannelReport, FrameMetric, QualityAnalyzer, QualityMetric, QualityReport,
    escape_filter_value,
};
pub use report::{ReportWriter, ResultRow, report_headers, report_record};
pub use runner::{CommandOutput, CommandRunner, TIMEOUT_EXIT_CODE, render_command};
pub use statistics::{StatSummary, quantile, summarize};
pub use transcode::{TranscodeReport, Transcoder};
pub use validation::{ValidationReport, validate_environment};
pub use vmaf::{ChannelSeries, parse_vmaf_channels, parse_vmaf_log};
