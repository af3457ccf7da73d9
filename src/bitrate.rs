//! Instantaneous bitrate from packet timing.
//!
//! [`compute_bitrate_windows`] walks the packets of a stream in probe order
//! and cuts them into windows of at least one second. Each closed window
//! yields one [`BitrateWindow`] sample; [`analyze_bitrate`] probes a file,
//! windows its packets and summarizes the samples.
//!
//! # Windowing rule
//!
//! A window opens at the first packet's timestamp with an empty byte count.
//! For every packet, `delta = timestamp - window_start`:
//!
//! - `delta <= 1.0` s: the packet's bytes join the window.
//! - `delta > 1.0` s: the window closes with
//!   `bitrate = bytes * 8 / delta / 1000` kbps, and a new window opens at
//!   this packet with the byte count set to this packet's size alone.
//!
//! The window still open after the last packet is never emitted, so trailing
//! data shorter than a window is dropped.
//!
//! # Example
//!
//! ```
//! use vqscore::{PacketRecord, compute_bitrate_windows};
//!
//! let packets = [
//!     PacketRecord::new(0.0, 100),
//!     PacketRecord::new(0.5, 100),
//!     PacketRecord::new(1.2, 100),
//!     PacketRecord::new(2.5, 100),
//! ];
//! let windows = compute_bitrate_windows(&packets);
//! assert_eq!(windows.len(), 2);
//! assert!((windows[0].bitrate_kbps - 1.3333).abs() < 1e-3);
//! ```

use std::path::Path;

use serde::Serialize;

use crate::error::ScoreError;
use crate::packet::PacketRecord;
use crate::probe::{ProbeOptions, Prober};
use crate::statistics::{StatSummary, summarize};

/// Minimum span, in seconds, before a window may close.
pub const WINDOW_SECONDS: f64 = 1.0;

/// One instantaneous bitrate sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BitrateWindow {
    /// Timestamp of the packet that opened the window, in seconds.
    pub start_time: f64,
    /// Average bitrate over the window, in kilobits per second.
    pub bitrate_kbps: f64,
}

/// Bitrate analysis of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitrateReport {
    /// Closed windows in time order.
    pub windows: Vec<BitrateWindow>,
    /// Summary over the window bitrates, in kbps.
    pub summary: StatSummary,
    /// Container size in bytes, as reported by the probe.
    pub size: u64,
}

/// Cut `packets` into bitrate windows.
pub fn compute_bitrate_windows(packets: &[PacketRecord]) -> Vec<BitrateWindow> {
    let Some(first) = packets.first() else {
        return Vec::new();
    };

    let mut windows = Vec::new();
    let mut window_start = first.timestamp;
    let mut window_bytes: u64 = 0;

    for packet in packets {
        let delta = packet.timestamp - window_start;
        if delta > WINDOW_SECONDS {
            windows.push(BitrateWindow {
                start_time: window_start,
                bitrate_kbps: (window_bytes as f64 * 8.0) / delta / 1000.0,
            });
            window_start = packet.timestamp;
            window_bytes = packet.size;
        } else {
            window_bytes += packet.size;
        }
    }

    windows
}

/// Probe `path` and compute its bitrate report.
///
/// # Errors
///
/// - [`ScoreError::NoPackets`] if the probe reports no packets.
/// - [`ScoreError::EmptySeries`] if no window closed (stream shorter than
///   a window).
/// - [`ScoreError::MissingField`] if the probe output has no format size.
/// - Any probe error (see [`Prober::probe`]).
pub fn analyze_bitrate<P: AsRef<Path>>(
    prober: &Prober,
    path: P,
) -> Result<BitrateReport, ScoreError> {
    let path = path.as_ref();
    let report = prober
        .probe(path, &ProbeOptions::packets_and_format())?
        .ok_or_else(|| ScoreError::NoPackets(path.to_path_buf()))?;

    let windows = compute_bitrate_windows(&report.packets);
    log::debug!(
        "{}: {} packet(s) -> {} bitrate window(s)",
        path.display(),
        report.packets.len(),
        windows.len()
    );

    let samples: Vec<f64> = windows.iter().map(|w| w.bitrate_kbps).collect();
    let summary = summarize("bitrate", &samples)?;

    let size = report
        .format
        .and_then(|format| format.size)
        .ok_or_else(|| ScoreError::MissingField {
            field: "format.size",
            path: path.to_path_buf(),
        })?;

    Ok(BitrateReport {
        windows,
        summary,
        size,
    })
}
