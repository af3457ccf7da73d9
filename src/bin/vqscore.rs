use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use vqscore::{
    BatchConfig, BatchRunner, BatchStage, CommandRunner, ProbeOptions, Prober, ProgressCallback,
    ProgressInfo, QualityAnalyzer, ReportLayout, TranscodeSettings, analyze_bitrate,
    validate_environment,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vqscore run --input videos/input --output videos/output --model vmaf_v0.6.1.json --progress\n  vqscore run --layout per-channel --detailed --report results.csv --overwrite\n  vqscore bitrate videos/output/clip.mp4 --json\n  vqscore vmaf out.mp4 in.mp4 --model vmaf_v0.6.1.json\n  vqscore check --model vmaf_v0.6.1.json\n  vqscore completions zsh > _vqscore";

#[derive(Debug, Parser)]
#[command(
    name = "vqscore",
    version,
    about = "Transcode videos and score them with VMAF, PSNR, bitrate and CPU usage",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output (RUST_LOG overrides).
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting an existing report.
    #[arg(long, global = true)]
    overwrite: bool,

    /// Path to the ffmpeg binary.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Timeout in seconds for each external tool invocation.
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Debug, Args, Clone)]
struct BatchArgs {
    /// Directory of reference videos.
    #[arg(long = "input", default_value = "videos/input")]
    input_dir: PathBuf,

    /// Directory receiving the transcoded videos.
    #[arg(long = "output", default_value = "videos/output")]
    output_dir: PathBuf,

    /// Directory for transient metric logs.
    #[arg(long = "scratch", default_value = "vmaf_log")]
    scratch_dir: PathBuf,

    /// CSV report path.
    #[arg(long, default_value = "results.csv")]
    report: PathBuf,

    /// libvmaf model file.
    #[arg(long, default_value = "vmaf_v0.6.1.json")]
    model: PathBuf,

    /// ffmpeg video encoder.
    #[arg(long, default_value = "libx264")]
    codec: String,

    /// Target video bitrate.
    #[arg(long, default_value = "1000k")]
    bitrate: String,

    /// Report layout: aggregate | per-channel.
    #[arg(long, default_value = "aggregate")]
    layout: String,

    /// Add standard deviation and percentile columns.
    #[arg(long)]
    detailed: bool,

    /// CPU sampling interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    cpu_interval_ms: u64,

    /// Only kill the tool itself on timeout, not its child processes.
    #[arg(long)]
    no_kill_tree: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Transcode and score every video in the input directory.
    #[command(
        about = "Run the batch",
        after_help = "Examples:\n  vqscore run --progress\n  vqscore run --codec libx265 --bitrate 2M --timeout 600"
    )]
    Run {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Instantaneous bitrate of a file.
    #[command(about = "Compute windowed bitrate")]
    Bitrate {
        /// Video file to probe.
        input: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// VMAF of a distorted video against its reference.
    #[command(about = "Compute VMAF")]
    Vmaf {
        distorted: PathBuf,
        reference: PathBuf,
        /// libvmaf model file.
        #[arg(long, default_value = "vmaf_v0.6.1.json")]
        model: PathBuf,
        /// Print per-channel PSNR from the same libvmaf run.
        #[arg(long)]
        channels: bool,
        #[arg(long)]
        json: bool,
    },

    /// PSNR of a distorted video against its reference.
    #[command(about = "Compute PSNR")]
    Psnr {
        distorted: PathBuf,
        reference: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Print ffprobe information for a file.
    #[command(
        about = "Probe a video file",
        after_help = "Examples:\n  vqscore probe clip.mp4\n  vqscore probe clip.mp4 --packets --json"
    )]
    Probe {
        input: PathBuf,
        /// Include packet timestamps and sizes.
        #[arg(long)]
        packets: bool,
        #[arg(long)]
        json: bool,
    },

    /// Check tools, model and directories.
    #[command(about = "Validate the environment")]
    Check {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_layout(value: &str) -> Option<ReportLayout> {
    match value.to_ascii_lowercase().as_str() {
        "aggregate" | "agg" => Some(ReportLayout::Aggregate),
        "per-channel" | "per_channel" | "channels" | "yuv" => Some(ReportLayout::PerChannel),
        _ => None,
    }
}

fn parse_timeout(seconds: Option<u64>) -> Result<Option<Duration>, Box<dyn std::error::Error>> {
    match seconds {
        Some(0) => Err("--timeout must be greater than 0".into()),
        Some(seconds) => Ok(Some(Duration::from_secs(seconds))),
        None => Ok(None),
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "report already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn command_runner(global: &GlobalOptions) -> Result<CommandRunner, Box<dyn std::error::Error>> {
    Ok(CommandRunner::new().with_timeout(parse_timeout(global.timeout)?))
}

fn ffmpeg_path(global: &GlobalOptions) -> PathBuf {
    global.ffmpeg.clone().unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

fn ffprobe_path(global: &GlobalOptions) -> PathBuf {
    global
        .ffprobe
        .clone()
        .unwrap_or_else(|| PathBuf::from("ffprobe"))
}

fn build_config(
    global: &GlobalOptions,
    batch: &BatchArgs,
) -> Result<BatchConfig, Box<dyn std::error::Error>> {
    let layout = parse_layout(&batch.layout)
        .ok_or(format!("unsupported --layout: {}", batch.layout))?;
    Ok(BatchConfig::new()
        .with_input_dir(&batch.input_dir)
        .with_output_dir(&batch.output_dir)
        .with_scratch_dir(&batch.scratch_dir)
        .with_report_path(&batch.report)
        .with_model_path(&batch.model)
        .with_ffmpeg(ffmpeg_path(global))
        .with_ffprobe(ffprobe_path(global))
        .with_transcode(TranscodeSettings {
            codec: batch.codec.clone(),
            bitrate: batch.bitrate.clone(),
        })
        .with_timeout(parse_timeout(global.timeout)?)
        .with_kill_tree(!batch.no_kill_tree)
        .with_cpu_sample_interval(Duration::from_millis(batch.cpu_interval_ms))
        .with_layout(layout)
        .with_detailed(batch.detailed))
}

fn temp_log_path(suffix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vqscore-{}{suffix}", std::process::id()))
}

fn stage_label(stage: BatchStage) -> &'static str {
    match stage {
        BatchStage::Transcoding => "transcoding",
        BatchStage::Psnr => "psnr",
        BatchStage::Vmaf => "vmaf",
        BatchStage::Bitrate => "bitrate",
        BatchStage::WritingRow => "writing",
        BatchStage::Finished => "done",
        _ => "working",
    }
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.current);
        let video = info.video.as_deref().unwrap_or_default();
        self.bar
            .set_message(format!("{video} {}", stage_label(info.stage)));
        if info.current >= info.total && info.stage == BatchStage::Finished {
            self.bar.finish_with_message("done");
        }
    }
}

fn print_summary_line(label: &str, mean: f64, unit: &str) {
    println!("{} {mean:.3}{unit}", format!("{label}:").bold());
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Run { batch } => {
            let config = build_config(&cli.global, &batch)?;
            ensure_writable_path(config.report_path(), cli.global.overwrite)?;

            let mut runner = BatchRunner::new(config);
            if cli.global.progress {
                runner = runner.with_progress(Arc::new(TerminalProgress::new()?));
            }
            let summary = runner.run()?;

            for failure in &summary.failures {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} {}: {}", failure.video, failure.step, failure.message).yellow()
                );
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Scored {} video(s) into {}",
                    summary.rows.len(),
                    runner.config().report_path().display()
                )
                .green()
            );
        }
        Commands::Bitrate { input, json } => {
            let prober = Prober::new(ffprobe_path(&cli.global), command_runner(&cli.global)?);
            let report = analyze_bitrate(&prober, &input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Windows: {}", report.windows.len());
                println!("Size: {} bytes", report.size);
                print_summary_line("Mean bitrate", report.summary.mean, " kbps");
                println!(
                    "p0/p10/p50/p90: {:.1} / {:.1} / {:.1} / {:.1} kbps (std {:.1})",
                    report.summary.p0,
                    report.summary.p10,
                    report.summary.p50,
                    report.summary.p90,
                    report.summary.stddev,
                );
            }
        }
        Commands::Vmaf {
            distorted,
            reference,
            model,
            channels,
            json,
        } => {
            let analyzer = QualityAnalyzer::new(ffmpeg_path(&cli.global), command_runner(&cli.global)?)
                .with_model_path(model);
            let log_path = temp_log_path("_vmaf.json");
            if channels {
                let report = analyzer.vmaf_with_channel_psnr(&distorted, &reference, &log_path)?;
                if json {
                    let payload = json!({
                        "vmaf": report.vmaf.summary,
                        "psnr_y": report.psnr_y.summary,
                        "psnr_cb": report.psnr_cb.summary,
                        "psnr_cr": report.psnr_cr.summary,
                        "frames": report.vmaf.frames.len(),
                    });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                } else {
                    print_summary_line("VMAF", report.vmaf.summary.mean, "");
                    print_summary_line("PSNR Y", report.psnr_y.summary.mean, " dB");
                    print_summary_line("PSNR Cb", report.psnr_cb.summary.mean, " dB");
                    print_summary_line("PSNR Cr", report.psnr_cr.summary.mean, " dB");
                }
            } else {
                let report = analyzer.vmaf(&distorted, &reference, &log_path)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_summary_line("VMAF", report.summary.mean, "");
                    println!("Frames: {}", report.frames.len());
                }
            }
        }
        Commands::Psnr {
            distorted,
            reference,
            json,
        } => {
            let analyzer = QualityAnalyzer::new(ffmpeg_path(&cli.global), command_runner(&cli.global)?);
            let report = analyzer.psnr(&distorted, &reference, temp_log_path("_psnr.log"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary_line("PSNR", report.summary.mean, " dB");
                println!("Frames: {}", report.frames.len());
            }
        }
        Commands::Probe {
            input,
            packets,
            json,
        } => {
            let prober = Prober::new(ffprobe_path(&cli.global), command_runner(&cli.global)?);
            let options = ProbeOptions {
                packets,
                format: true,
                streams: true,
            };
            let Some(report) = prober.probe(&input, &options)? else {
                return Err(format!("no packets reported for {}", input.display()).into());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if let Some(format) = &report.format {
                    println!(
                        "Format: {}",
                        format.format_name.as_deref().unwrap_or("unknown")
                    );
                    if let Some(duration) = format.duration {
                        println!("Duration: {duration:.3}s");
                    }
                    if let Some(size) = format.size {
                        println!("Size: {size} bytes");
                    }
                }
                for stream in &report.streams {
                    println!(
                        "Video #{}: {}x{} @ {} [{}]",
                        stream.index,
                        stream.width.unwrap_or_default(),
                        stream.height.unwrap_or_default(),
                        stream.avg_frame_rate.as_deref().unwrap_or("?"),
                        stream.codec_name.as_deref().unwrap_or("unknown"),
                    );
                }
                if packets {
                    println!("Packets: {}", report.packets.len());
                }
            }
        }
        Commands::Check { batch } => {
            let config = build_config(&cli.global, &batch)?;
            let report = validate_environment(&config);
            print!("{report}");
            if !report.is_valid() {
                return Err("environment check failed".into());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vqscore", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_layout, parse_timeout, stage_label};
    use vqscore::{BatchStage, ReportLayout};

    #[test]
    fn parse_layout_aliases() {
        assert_eq!(parse_layout("aggregate"), Some(ReportLayout::Aggregate));
        assert_eq!(parse_layout("Per-Channel"), Some(ReportLayout::PerChannel));
        assert_eq!(parse_layout("yuv"), Some(ReportLayout::PerChannel));
        assert_eq!(parse_layout("rgb"), None);
    }

    #[test]
    fn parse_timeout_values() {
        assert!(parse_timeout(None).unwrap().is_none());
        assert_eq!(parse_timeout(Some(30)).unwrap().unwrap().as_secs(), 30);
        assert!(parse_timeout(Some(0)).is_err());
    }

    #[test]
    fn stage_labels() {
        assert_eq!(stage_label(BatchStage::Transcoding), "transcoding");
        assert_eq!(stage_label(BatchStage::Finished), "done");
    }
}
