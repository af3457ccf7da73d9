//! Video transcoding with CPU monitoring.
//!
//! [`Transcoder`] re-encodes a reference video with ffmpeg to the configured
//! codec and target bitrate while a [`CpuMonitor`] samples system CPU
//! utilization. The monitor is stopped as soon as ffmpeg returns, so the
//! samples cover the encode only.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vqscore::{CommandRunner, ProcStatSampler, TranscodeSettings, Transcoder};
//!
//! let transcoder = Transcoder::new("ffmpeg", CommandRunner::new(), TranscodeSettings::default());
//! let report = transcoder.run(
//!     "videos/input/clip.mp4",
//!     "videos/output/clip.mp4",
//!     Box::new(ProcStatSampler::new()),
//!     Duration::from_secs(1),
//! )?;
//! report.check("videos/input/clip.mp4")?;
//! println!("average CPU {:.1}%", report.cpu.average);
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::config::TranscodeSettings;
use crate::cpu::{CpuMonitor, CpuSampler, CpuUsage};
use crate::error::ScoreError;
use crate::runner::CommandRunner;

/// Outcome of one transcode.
///
/// A transcode that ran but failed is still a report: the CPU samples are
/// valid. Use [`check`](TranscodeReport::check) to turn a failure into an
/// error.
#[derive(Debug, Clone)]
pub struct TranscodeReport {
    /// System CPU utilization sampled while ffmpeg ran.
    pub cpu: CpuUsage,
    /// Wall-clock time of the ffmpeg run.
    pub elapsed: Duration,
    /// ffmpeg's exit code, or the timeout sentinel.
    pub exit_code: i32,
    /// Whether ffmpeg was killed at the deadline.
    pub timed_out: bool,
    /// ffmpeg's standard error, trimmed.
    pub stderr: String,
}

impl TranscodeReport {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// `Ok(())` if the transcode succeeded.
    ///
    /// # Errors
    ///
    /// [`ScoreError::TranscodeFailed`] naming `input` otherwise.
    pub fn check<P: AsRef<Path>>(&self, input: P) -> Result<(), ScoreError> {
        if self.success() {
            return Ok(());
        }
        let reason = if self.timed_out {
            format!("timed out after {:.1}s", self.elapsed.as_secs_f64())
        } else {
            let last_line = self.stderr.lines().last().unwrap_or_default();
            format!("ffmpeg exited with {}: {last_line}", self.exit_code)
        };
        Err(ScoreError::TranscodeFailed {
            input: input.as_ref().to_path_buf(),
            reason,
        })
    }
}

/// Re-encodes videos with ffmpeg.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    runner: CommandRunner,
    settings: TranscodeSettings,
}

impl Transcoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: CommandRunner, settings: TranscodeSettings) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
            settings,
        }
    }

    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }

    /// The ffmpeg command encoding `input` into `output`, overwriting it.
    pub fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .arg("-i")
            .arg(input)
            .args(["-c:v", self.settings.codec.as_str()])
            .args(["-b:v", self.settings.bitrate.as_str()])
            .arg("-y")
            .arg(output);
        command
    }

    /// Transcode `input` to `output` while sampling CPU every
    /// `sample_interval`.
    ///
    /// # Errors
    ///
    /// Only [`ScoreError::Spawn`] and I/O errors while waiting. A non-zero
    /// exit or a timeout is reported through the returned
    /// [`TranscodeReport`].
    pub fn run<P, Q>(
        &self,
        input: P,
        output: Q,
        sampler: Box<dyn CpuSampler>,
        sample_interval: Duration,
    ) -> Result<TranscodeReport, ScoreError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let mut command = self.command(input.as_ref(), output.as_ref());

        let started = Instant::now();
        let monitor = CpuMonitor::start(sampler, sample_interval);
        let result = self.runner.run(&mut command);
        let cpu = monitor.stop();
        let elapsed = started.elapsed();

        let output = result?;
        log::debug!(
            "Transcoded {} in {:.2}s (exit {}, {} CPU sample(s))",
            input.as_ref().display(),
            elapsed.as_secs_f64(),
            output.exit_code,
            cpu.samples.len()
        );

        Ok(TranscodeReport {
            cpu,
            elapsed,
            exit_code: output.exit_code,
            timed_out: output.timed_out,
            stderr: output.stderr_text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(exit_code: i32, timed_out: bool, stderr: &str) -> TranscodeReport {
        TranscodeReport {
            cpu: CpuUsage::default(),
            elapsed: Duration::from_millis(1500),
            exit_code,
            timed_out,
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn command_layout() {
        let transcoder = Transcoder::new(
            "ffmpeg",
            CommandRunner::new(),
            TranscodeSettings {
                codec: "libx265".to_string(),
                bitrate: "2M".to_string(),
            },
        );
        let command = transcoder.command(Path::new("in/a.mp4"), Path::new("out/a.mp4"));
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-hide_banner", "-i", "in/a.mp4", "-c:v", "libx265", "-b:v", "2M", "-y", "out/a.mp4"]
        );
    }

    #[test]
    fn check_success() {
        assert!(report(0, false, "").check("a.mp4").is_ok());
    }

    #[test]
    fn check_reports_last_stderr_line() {
        let error = report(1, false, "frame=1\nUnknown encoder 'libfoo'")
            .check("a.mp4")
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("a.mp4"));
        assert!(message.contains("Unknown encoder 'libfoo'"));
    }

    #[test]
    fn check_reports_timeout() {
        let error = report(-9, true, "").check("a.mp4").unwrap_err();
        assert!(matches!(error, ScoreError::TranscodeFailed { ref reason, .. } if reason.contains("timed out")));
    }
}
