//! Error handling integration tests.
//!
//! These tests verify that errors carry meaningful messages and are
//! classified correctly as fatal or per-video.

use std::path::PathBuf;
use std::time::Duration;

use vqscore::ScoreError;

#[test]
fn soft_errors_are_not_fatal() {
    let soft = [
        ScoreError::CommandFailed {
            command: "ffmpeg -i a.mp4".to_string(),
            exit_code: 1,
            stderr: "Invalid data".to_string(),
        },
        ScoreError::Timeout {
            command: "ffmpeg -i a.mp4".to_string(),
            timeout: Duration::from_secs(60),
        },
        ScoreError::MissingLog(PathBuf::from("vmaf_log/a.mp4_vmaf.json")),
        ScoreError::NoPackets(PathBuf::from("a.mp4")),
        ScoreError::MissingField {
            field: "format.size",
            path: PathBuf::from("a.mp4"),
        },
        ScoreError::EmptySeries {
            metric: "psnr".to_string(),
        },
        ScoreError::TranscodeFailed {
            input: PathBuf::from("a.mp4"),
            reason: "ffmpeg exited with 1".to_string(),
        },
    ];
    for error in &soft {
        assert!(!error.is_fatal(), "{error} should not be fatal");
    }
}

#[test]
fn configuration_and_spawn_errors_are_fatal() {
    let spawn = ScoreError::Spawn {
        program: "ffprobe".to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    };
    assert!(spawn.is_fatal());
    assert!(ScoreError::InvalidConfig("bad".to_string()).is_fatal());
}

#[test]
fn messages_name_the_subject() {
    let error = ScoreError::MissingLog(PathBuf::from("vmaf_log/clip.mp4_psnr.log"));
    assert!(
        error.to_string().contains("clip.mp4_psnr.log"),
        "Error message should name the log: {error}",
    );

    let error = ScoreError::Timeout {
        command: "ffmpeg -hide_banner".to_string(),
        timeout: Duration::from_secs(5),
    };
    let message = error.to_string();
    assert!(message.contains("5s") && message.contains("ffmpeg"));

    let error = ScoreError::Timeout {
        command: "ffprobe".to_string(),
        timeout: Duration::from_millis(250),
    };
    assert!(
        error.to_string().contains("250ms"),
        "Sub-second timeouts keep their precision: {error}",
    );
}

#[test]
fn spawn_error_exposes_source() {
    use std::error::Error;

    let error = ScoreError::Spawn {
        program: "ffmpeg".to_string(),
        source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    };
    assert!(error.source().is_some());
}

#[test]
fn json_error_converts() {
    let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: ScoreError = parse_error.into();
    assert!(matches!(error, ScoreError::JsonError(_)));
    assert!(!error.is_fatal());
}
