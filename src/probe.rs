//! Media probing through ffprobe.
//!
//! [`Prober`] runs ffprobe in JSON mode, restricted to video streams and
//! with banner and log output suppressed, and parses the payload into a
//! [`ProbeReport`].
//!
//! A probe that asks for packets but gets none back yields `Ok(None)`: the
//! file was probed fine but there is no data to analyze. A tool failure is
//! an `Err`.
//!
//! # Example
//!
//! ```no_run
//! use vqscore::{CommandRunner, ProbeOptions, Prober};
//!
//! let prober = Prober::new("ffprobe", CommandRunner::new());
//! match prober.probe("output.mp4", &ProbeOptions::packets_and_format())? {
//!     Some(report) => println!("{} packets", report.packets.len()),
//!     None => println!("no packets"),
//! }
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::packet::{PacketRecord, RawPacket};
use crate::runner::CommandRunner;

/// Which sections ffprobe should print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeOptions {
    /// `-show_packets`.
    pub packets: bool,
    /// `-show_format`.
    pub format: bool,
    /// `-show_streams`.
    pub streams: bool,
}

impl ProbeOptions {
    /// Packets plus container format, as needed for bitrate analysis.
    pub fn packets_and_format() -> Self {
        Self {
            packets: true,
            format: true,
            streams: false,
        }
    }

    /// Container format and stream descriptions, without packets.
    pub fn format_and_streams() -> Self {
        Self {
            packets: false,
            format: true,
            streams: true,
        }
    }

    fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.packets {
            flags.push("-show_packets");
        }
        if self.format {
            flags.push("-show_format");
        }
        if self.streams {
            flags.push("-show_streams");
        }
        flags
    }
}

/// Container-level information from `-show_format`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormatInfo {
    /// Path as ffprobe was given it.
    pub filename: Option<String>,
    /// Demuxer names, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    pub format_name: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// File size in bytes, as reported by the container.
    pub size: Option<u64>,
    /// Overall bitrate in bits per second.
    pub bit_rate: Option<u64>,
}

/// One video stream from `-show_streams`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamInfo {
    /// Stream index within the container.
    pub index: u32,
    /// Short codec name, e.g. `h264`.
    pub codec_name: Option<String>,
    /// Coded width in pixels.
    pub width: Option<u32>,
    /// Coded height in pixels.
    pub height: Option<u32>,
    /// Average frame rate as ffprobe prints it, e.g. `30000/1001`.
    pub avg_frame_rate: Option<String>,
    /// Stream bitrate in bits per second, when the container records one.
    pub bit_rate: Option<u64>,
}

/// Parsed ffprobe output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeReport {
    /// Video packets in the order ffprobe printed them.
    pub packets: Vec<PacketRecord>,
    /// Present when `-show_format` was requested.
    pub format: Option<FormatInfo>,
    /// Video streams; empty unless `-show_streams` was requested.
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    #[serde(default)]
    packets: Option<Vec<RawPacket>>,
    #[serde(default)]
    format: Option<RawFormat>,
    #[serde(default)]
    streams: Option<Vec<RawStream>>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    filename: Option<String>,
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    #[serde(default)]
    index: u32,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl From<RawFormat> for FormatInfo {
    fn from(raw: RawFormat) -> Self {
        Self {
            duration: parse_number(raw.duration.as_deref()),
            size: parse_number(raw.size.as_deref()),
            bit_rate: parse_number(raw.bit_rate.as_deref()),
            filename: raw.filename,
            format_name: raw.format_name,
        }
    }
}

impl From<RawStream> for StreamInfo {
    fn from(raw: RawStream) -> Self {
        Self {
            index: raw.index,
            bit_rate: parse_number(raw.bit_rate.as_deref()),
            codec_name: raw.codec_name,
            width: raw.width,
            height: raw.height,
            avg_frame_rate: raw.avg_frame_rate,
        }
    }
}

/// Parse an ffprobe JSON payload.
///
/// Returns `Ok(None)` when `options.packets` is set and the payload has no
/// `packets` field or an empty packet list.
///
/// # Errors
///
/// [`ScoreError::JsonError`] if the payload is not valid ffprobe JSON.
pub fn parse_probe_output(
    payload: &[u8],
    options: &ProbeOptions,
) -> Result<Option<ProbeReport>, ScoreError> {
    let raw: RawProbe = serde_json::from_slice(payload)?;

    let raw_packets = raw.packets.unwrap_or_default();
    let packets: Vec<PacketRecord> = raw_packets.iter().filter_map(RawPacket::to_record).collect();
    let skipped = raw_packets.len() - packets.len();
    if skipped > 0 {
        log::debug!("Skipped {skipped} packet(s) without dts_time or size");
    }
    if options.packets && packets.is_empty() {
        return Ok(None);
    }

    Ok(Some(ProbeReport {
        packets,
        format: raw.format.map(FormatInfo::from),
        streams: raw
            .streams
            .unwrap_or_default()
            .into_iter()
            .map(StreamInfo::from)
            .collect(),
    }))
}

/// Runs ffprobe and parses its output.
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe: PathBuf,
    runner: CommandRunner,
}

impl Prober {
    /// Create a prober for the given ffprobe binary.
    pub fn new(ffprobe: impl Into<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            runner,
        }
    }

    /// Build the ffprobe command line for `path`.
    pub fn command<P: AsRef<Path>>(&self, path: P, options: &ProbeOptions) -> Command {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-hide_banner", "-loglevel", "quiet", "-print_format", "json"])
            .args(["-select_streams", "v"])
            .args(options.flags())
            .arg(path.as_ref());
        command
    }

    /// Probe `path`.
    ///
    /// # Errors
    ///
    /// - [`ScoreError::Spawn`] if ffprobe cannot be started.
    /// - [`ScoreError::Timeout`] / [`ScoreError::CommandFailed`] if it hangs
    ///   or exits non-zero.
    /// - [`ScoreError::JsonError`] if its output cannot be parsed.
    pub fn probe<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ProbeOptions,
    ) -> Result<Option<ProbeReport>, ScoreError> {
        let mut command = self.command(&path, options);
        let output = self.runner.run_checked(&mut command)?;
        parse_probe_output(&output.stdout, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "packets": [
            {"codec_type": "video", "stream_index": 0, "dts_time": "0.000000", "size": "1500"},
            {"codec_type": "video", "stream_index": 0, "dts_time": "0.040000", "size": "700"},
            {"codec_type": "video", "stream_index": 0, "size": "80"}
        ],
        "format": {
            "filename": "clip.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "10.000000",
            "size": "1254321",
            "bit_rate": "1003456"
        }
    }"#;

    #[test]
    fn parses_packets_and_format() {
        let report = parse_probe_output(PAYLOAD.as_bytes(), &ProbeOptions::packets_and_format())
            .unwrap()
            .unwrap();
        assert_eq!(
            report.packets,
            vec![PacketRecord::new(0.0, 1500), PacketRecord::new(0.04, 700)]
        );
        let format = report.format.unwrap();
        assert_eq!(format.size, Some(1_254_321));
        assert_eq!(format.duration, Some(10.0));
        assert_eq!(format.bit_rate, Some(1_003_456));
    }

    #[test]
    fn empty_packet_list_is_no_data() {
        let result =
            parse_probe_output(br#"{"packets": []}"#, &ProbeOptions::packets_and_format())
                .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_packet_field_is_no_data() {
        let result = parse_probe_output(
            br#"{"format": {"size": "10"}}"#,
            &ProbeOptions::packets_and_format(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn packets_without_timing_or_size_are_no_data() {
        let result = parse_probe_output(
            br#"{"packets": [{"codec_type": "video", "size": "100"}, {"dts_time": "0.5"}]}"#,
            &ProbeOptions::packets_and_format(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn packets_not_requested_is_fine() {
        let report = parse_probe_output(
            br#"{"streams": [{"index": 0, "codec_name": "h264", "width": 640, "height": 360, "avg_frame_rate": "25/1"}]}"#,
            &ProbeOptions::format_and_streams(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].width, Some(640));
        assert_eq!(report.streams[0].codec_name.as_deref(), Some("h264"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = parse_probe_output(b"", &ProbeOptions::packets_and_format());
        assert!(matches!(result, Err(ScoreError::JsonError(_))));
    }

    #[test]
    fn command_selects_video_and_quiet_json() {
        let prober = Prober::new("ffprobe", CommandRunner::new());
        let command = prober.command("in.mp4", &ProbeOptions::packets_and_format());
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "-hide_banner",
                "-loglevel",
                "quiet",
                "-print_format",
                "json",
                "-select_streams",
                "v",
                "-show_packets",
                "-show_format",
                "in.mp4"
            ]
        );
    }
}
