//! Probe adapter integration tests.

use vqscore::{PacketRecord, ProbeOptions, ScoreError, parse_probe_output};

const FFPROBE_OUTPUT: &str = r#"{
    "packets": [
        {"codec_type": "video", "stream_index": 0, "pts": 0, "pts_time": "0.000000", "dts": -512, "dts_time": "-0.040000", "size": "28377", "flags": "K__"},
        {"codec_type": "video", "stream_index": 0, "pts": 2048, "pts_time": "0.160000", "dts": 0, "dts_time": "0.000000", "size": "1542", "flags": "___"},
        {"codec_type": "video", "stream_index": 0, "pts": 1024, "pts_time": "0.080000", "dts": 512, "dts_time": "0.040000", "size": "402", "flags": "___"}
    ],
    "streams": [
        {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "25/1", "bit_rate": "998124"}
    ],
    "format": {
        "filename": "videos/output/clip.mp4",
        "nb_streams": 1,
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "duration": "10.000000",
        "size": "1254321",
        "bit_rate": "1003456"
    }
}"#;

// ── Packets ────────────────────────────────────────────────────────

#[test]
fn packets_keep_probe_order() {
    let report = parse_probe_output(FFPROBE_OUTPUT.as_bytes(), &ProbeOptions::packets_and_format())
        .expect("Failed to parse")
        .expect("Expected packets");

    assert_eq!(
        report.packets,
        vec![
            PacketRecord::new(-0.04, 28377),
            PacketRecord::new(0.0, 1542),
            PacketRecord::new(0.04, 402),
        ]
    );
}

#[test]
fn empty_packets_is_none() {
    let result = parse_probe_output(br#"{"packets": []}"#, &ProbeOptions::packets_and_format())
        .expect("Failed to parse");
    assert!(result.is_none());
}

// ── Format and streams ─────────────────────────────────────────────

#[test]
fn format_fields_are_numeric() {
    let report = parse_probe_output(FFPROBE_OUTPUT.as_bytes(), &ProbeOptions::format_and_streams())
        .expect("Failed to parse")
        .expect("Expected a report");

    let format = report.format.expect("Expected format section");
    assert_eq!(format.size, Some(1_254_321));
    assert_eq!(format.bit_rate, Some(1_003_456));
    assert_eq!(format.filename.as_deref(), Some("videos/output/clip.mp4"));

    let stream = &report.streams[0];
    assert_eq!((stream.width, stream.height), (Some(1920), Some(1080)));
    assert_eq!(stream.bit_rate, Some(998_124));
}

#[test]
fn missing_size_is_none() {
    let report = parse_probe_output(
        br#"{"format": {"filename": "x.mp4", "size": "N/A"}}"#,
        &ProbeOptions::format_and_streams(),
    )
    .expect("Failed to parse")
    .expect("Expected a report");
    assert_eq!(report.format.and_then(|f| f.size), None);
}

// ── Errors ─────────────────────────────────────────────────────────

#[test]
fn truncated_output_is_json_error() {
    let result = parse_probe_output(br#"{"packets": ["#, &ProbeOptions::packets_and_format());
    assert!(matches!(result, Err(ScoreError::JsonError(_))));
}
