//! Environment validation integration tests.

use vqscore::{BatchConfig, validate_environment};

#[test]
fn missing_tools_are_errors() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let config = BatchConfig::new()
        .with_input_dir(directory.path())
        .with_output_dir(directory.path().join("output"))
        .with_scratch_dir(directory.path().join("scratch"))
        .with_ffmpeg("/nonexistent/ffmpeg")
        .with_ffprobe("/nonexistent/ffprobe")
        .with_model_path(directory.path().join("model.json"));

    let report = validate_environment(&config);

    assert!(!report.is_valid());
    assert!(report.errors.iter().any(|e| e.contains("ffmpeg is not runnable")));
    assert!(report.errors.iter().any(|e| e.contains("ffprobe is not runnable")));
    assert!(report.warnings.iter().any(|w| w.contains("VMAF model not found")));
    assert!(report.info.iter().any(|i| i.contains("will be created")));

    let rendered = report.to_string();
    assert!(rendered.contains("[ERROR]"));
    assert!(rendered.contains("[WARN]"));
}

#[test]
fn validation_does_not_create_directories() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let scratch = directory.path().join("scratch");
    let config = BatchConfig::new()
        .with_input_dir(directory.path())
        .with_scratch_dir(&scratch)
        .with_ffmpeg("/nonexistent/ffmpeg")
        .with_ffprobe("/nonexistent/ffprobe");

    let _ = validate_environment(&config);
    assert!(!scratch.exists());
}

#[test]
fn input_file_instead_of_directory() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let file = directory.path().join("input.mp4");
    std::fs::write(&file, b"x").expect("Failed to write file");

    let report = validate_environment(
        &BatchConfig::new()
            .with_input_dir(&file)
            .with_ffmpeg("/nonexistent/ffmpeg")
            .with_ffprobe("/nonexistent/ffprobe"),
    );
    assert!(report.errors.iter().any(|e| e.contains("Input directory does not exist")));
}
