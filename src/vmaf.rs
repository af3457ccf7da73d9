//! libvmaf JSON log parsing.
//!
//! libvmaf writes one entry per frame under `frames`, each carrying a
//! `metrics` object. Entries are read in order; every entry must have a
//! `vmaf` score.

use serde::Deserialize;

use crate::error::ScoreError;
use crate::quality::FrameMetric;

#[derive(Debug, Deserialize)]
struct VmafLog {
    frames: Vec<VmafFrame>,
}

#[derive(Debug, Deserialize)]
struct VmafFrame {
    #[serde(rename = "frameNum", default)]
    frame_num: Option<u64>,
    metrics: VmafFrameMetrics,
}

#[derive(Debug, Deserialize)]
struct VmafFrameMetrics {
    vmaf: f64,
    #[serde(default)]
    psnr_y: Option<f64>,
    #[serde(default)]
    psnr_cb: Option<f64>,
    #[serde(default)]
    psnr_cr: Option<f64>,
}

/// Per-frame series from a libvmaf run with the PSNR feature enabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSeries {
    /// `metrics.vmaf` of every frame.
    pub vmaf: Vec<FrameMetric>,
    /// `metrics.psnr_y`, for frames where it is finite.
    pub psnr_y: Vec<FrameMetric>,
    /// `metrics.psnr_cb`, for frames where it is finite.
    pub psnr_cb: Vec<FrameMetric>,
    /// `metrics.psnr_cr`, for frames where it is finite.
    pub psnr_cr: Vec<FrameMetric>,
}

fn frame_index(frame: &VmafFrame, position: usize) -> u64 {
    frame.frame_num.unwrap_or(position as u64)
}

/// Per-frame VMAF scores from a libvmaf JSON log, in log order.
///
/// # Errors
///
/// [`ScoreError::JsonError`] if the log is not valid JSON or an entry has
/// no numeric `metrics.vmaf`.
pub fn parse_vmaf_log(contents: &str) -> Result<Vec<FrameMetric>, ScoreError> {
    let log: VmafLog = serde_json::from_str(contents)?;
    Ok(log
        .frames
        .iter()
        .enumerate()
        .map(|(position, frame)| FrameMetric {
            index: frame_index(frame, position),
            value: frame.metrics.vmaf,
        })
        .collect())
}

/// Per-frame VMAF and PSNR Y/Cb/Cr from a libvmaf JSON log.
///
/// Non-finite PSNR values (identical planes) and frames without a given
/// channel are left out of that channel's series.
///
/// # Errors
///
/// As for [`parse_vmaf_log`].
pub fn parse_vmaf_channels(contents: &str) -> Result<ChannelSeries, ScoreError> {
    let log: VmafLog = serde_json::from_str(contents)?;
    let mut series = ChannelSeries::default();

    for (position, frame) in log.frames.iter().enumerate() {
        let index = frame_index(frame, position);
        series.vmaf.push(FrameMetric {
            index,
            value: frame.metrics.vmaf,
        });

        let channels = [
            (&mut series.psnr_y, frame.metrics.psnr_y),
            (&mut series.psnr_cb, frame.metrics.psnr_cb),
            (&mut series.psnr_cr, frame.metrics.psnr_cr),
        ];
        for (target, value) in channels {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                target.push(FrameMetric { index, value });
            }
        }
    }

    Ok(series)
}
