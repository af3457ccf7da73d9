//! Environment validation.
//!
//! Provides [`validate_environment`] which checks that the external tools,
//! the VMAF model and the batch directories are usable before a run, and
//! returns a [`ValidationReport`] describing what it found.
//!
//! # Example
//!
//! ```no_run
//! use vqscore::{BatchConfig, validate_environment};
//!
//! let report = validate_environment(&BatchConfig::new());
//! if report.is_valid() {
//!     println!("Ready to run");
//! } else {
//!     print!("{report}");
//! }
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::process::Command;

use crate::config::BatchConfig;
use crate::runner::CommandRunner;

/// Summary of environment validation.
///
/// Contains lists of informational notices, warnings, and errors found
/// during validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Issues that will affect some metrics but not stop a run.
    pub warnings: Vec<String>,
    /// Issues that will prevent a run.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found.
    ///
    /// Warnings do not affect this result; only errors make the report
    /// invalid.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of entries (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

/// First line of `<tool> -version`, or `None` if it cannot be run.
fn tool_version(runner: &CommandRunner, tool: &Path) -> Option<String> {
    let mut command = Command::new(tool);
    command.arg("-version");
    let output = runner.run(&mut command).ok()?;
    if !output.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}

fn lists_filter(filters_output: &str, name: &str) -> bool {
    filters_output
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(name))
}

fn has_filter(runner: &CommandRunner, ffmpeg: &Path, name: &str) -> bool {
    let mut command = Command::new(ffmpeg);
    command.args(["-hide_banner", "-filters"]);
    match runner.run(&mut command) {
        Ok(output) if output.success() => {
            lists_filter(&String::from_utf8_lossy(&output.stdout), name)
        }
        _ => false,
    }
}

fn check_directory(report: &mut ValidationReport, label: &str, path: &Path) {
    if path.is_dir() {
        report
            .info
            .push(format!("{label} directory: {}", path.display()));
    } else if path.exists() {
        report.errors.push(format!(
            "{label} path is not a directory: {}",
            path.display()
        ));
    } else {
        report.info.push(format!(
            "{label} directory will be created: {}",
            path.display()
        ));
    }
}

/// Check tools, model and directories for `config`.
///
/// Nothing is created or modified.
pub fn validate_environment(config: &BatchConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let runner = CommandRunner::new().with_timeout(config.timeout());
    let tools = config.tools();

    // ── Tools ──────────────────────────────────────────────────────
    match tool_version(&runner, &tools.ffmpeg) {
        Some(version) => report.info.push(version),
        None => report.errors.push(format!(
            "ffmpeg is not runnable: {}",
            tools.ffmpeg.display()
        )),
    }
    match tool_version(&runner, &tools.ffprobe) {
        Some(version) => report.info.push(version),
        None => report.errors.push(format!(
            "ffprobe is not runnable: {}",
            tools.ffprobe.display()
        )),
    }

    if has_filter(&runner, &tools.ffmpeg, "libvmaf") {
        report.info.push("ffmpeg provides the libvmaf filter".to_string());
    } else {
        report
            .warnings
            .push("ffmpeg does not list the libvmaf filter; VMAF cells will be empty".to_string());
    }

    // ── Model ──────────────────────────────────────────────────────
    if config.model_path().is_file() {
        report
            .info
            .push(format!("VMAF model: {}", config.model_path().display()));
    } else {
        report.warnings.push(format!(
            "VMAF model not found: {}",
            config.model_path().display()
        ));
    }

    // ── Directories ────────────────────────────────────────────────
    if config.input_dir().is_dir() {
        report.info.push(format!(
            "Input directory: {}",
            config.input_dir().display()
        ));
    } else {
        report.errors.push(format!(
            "Input directory does not exist: {}",
            config.input_dir().display()
        ));
    }
    check_directory(&mut report, "Output", config.output_dir());
    check_directory(&mut report, "Scratch", config.scratch_dir());

    if config.input_dir() == config.output_dir() {
        report
            .errors
            .push("Output directory must differ from the input directory".to_string());
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_listing_match() {
        let listing = " TSC libvmaf           VV->V      Calculate the VMAF between two video streams.\n \
                        ... psnr              VV->V      Calculate the PSNR between two video streams.\n";
        assert!(lists_filter(listing, "libvmaf"));
        assert!(lists_filter(listing, "psnr"));
        assert!(!lists_filter(listing, "ssim"));
    }

    #[test]
    fn display_prefixes() {
        let report = ValidationReport {
            info: vec!["a".to_string()],
            warnings: vec!["b".to_string()],
            errors: vec!["c".to_string()],
        };
        assert_eq!(report.to_string(), "[INFO] a\n[WARN] b\n[ERROR] c\n");
        assert!(!report.is_valid());
    }

    #[test]
    fn empty_report() {
        assert_eq!(ValidationReport::default().to_string(), "No issues found.\n");
    }
}
