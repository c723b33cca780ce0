use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use recompress::{
    EncodeOptions, FfmpegLogLevel, MediaInput, MediaSource, NoOpProgress, OutputContainer, ProgressCallback,
    QualityLevel, ResolutionPreset, TranscodeSession, VideoCodec,
};

const CLI_AFTER_HELP: &str = "Examples:\n  recompress compress input.mp4 output.mp4 --quality 3 --resolution 720p --progress\n  recompress compress input.mp4 output.mp4 --codec hevc --max-bitrate 4000000\n  recompress probe input.mp4 --json\n  recompress completions zsh > _recompress";

#[derive(Debug, Parser)]
#[command(
    name = "recompress",
    version,
    about = "Re-encode videos into smaller MP4 files",
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
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Re-encode a video into a smaller MP4.
    #[command(
        about = "Re-encode a video into a smaller MP4",
        after_help = "Examples:\n  recompress compress input.mp4 output.mp4\n  recompress compress input.mp4 output.mp4 --quality 2 --resolution 1080p --progress"
    )]
    Compress {
        /// Input media path.
        input: PathBuf,
        /// Output MP4 path.
        output: PathBuf,
        /// Quality level, 1 (smallest) to 5 (largest).
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(i32).range(1..=5))]
        quality: i32,
        /// Resolution target: 4k | 2k | 1080p | 720p | 540p | 480p | 360p | original.
        #[arg(long, default_value = "original")]
        resolution: String,
        /// Video codec: h264 | hevc.
        #[arg(long, default_value = "h264")]
        codec: String,
        /// Hard cap on the video bitrate, in bits per second.
        #[arg(long)]
        max_bitrate: Option<u64>,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Print track properties for a media file (alias: info).
    #[command(
        about = "Print media properties",
        visible_alias = "info",
        after_help = "Examples:\n  recompress probe input.mp4\n  recompress probe input.mp4 --json"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,

        /// Output properties as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn parse_resolution(value: &str) -> Option<ResolutionPreset> {
    match value.to_ascii_lowercase().as_str() {
        "4k" | "uhd" | "2160p" => Some(ResolutionPreset::Uhd4K),
        "2k" | "qhd" | "1440p" => Some(ResolutionPreset::Qhd2K),
        "1080p" | "fhd" => Some(ResolutionPreset::Hd1080),
        "720p" | "hd" => Some(ResolutionPreset::Hd720),
        "540p" => Some(ResolutionPreset::Sd540),
        "480p" => Some(ResolutionPreset::Sd480),
        "360p" => Some(ResolutionPreset::Sd360),
        "original" | "source" | "none" => Some(ResolutionPreset::Original),
        _ => None,
    }
}

fn parse_codec(value: &str) -> Option<VideoCodec> {
    match value.to_ascii_lowercase().as_str() {
        "h264" | "avc" | "x264" => Some(VideoCodec::H264),
        "hevc" | "h265" | "x265" => Some(VideoCodec::Hevc),
        _ => None,
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        recompress::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(1000);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {percent}% {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, fraction: f32) {
        self.bar.set_position((fraction * 1000.0) as u64);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Compress {
            input,
            output,
            quality,
            resolution,
            codec,
            max_bitrate,
            progress,
        } => {
            let preset = parse_resolution(&resolution)
                .ok_or(format!("unsupported --resolution: {resolution}"))?;
            let codec = parse_codec(&codec).ok_or(format!("unsupported --codec: {codec}"))?;

            if output.exists() {
                if !cli.global.overwrite {
                    return Err(format!(
                        "output already exists: {} (use --overwrite to replace)",
                        output.display()
                    )
                    .into());
                }
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("overwriting {}", output.display()).yellow()
                );
            }

            let source = MediaSource::open(&input)?;

            if cli.global.verbose {
                if let Some(video) = source.video_info() {
                    eprintln!(
                        "{} video {}x{} @ {:.2} fps",
                        "input:".cyan().bold(),
                        video.width,
                        video.height,
                        video.frame_rate,
                    );
                }
                if let Some(audio) = source.audio_info() {
                    eprintln!(
                        "{} audio {} Hz, {} ch",
                        "input:".cyan().bold(),
                        audio.sample_rate,
                        audio.channels,
                    );
                }
            }

            let mut options = EncodeOptions::new()
                .quality(QualityLevel::new(quality))
                .codec(codec)
                .resolution(preset.target());
            if let Some(cap) = max_bitrate {
                options = options.max_bitrate(cap);
            }

            let session = TranscodeSession::new(source, options, &output);

            let written = if progress {
                let terminal = Arc::new(TerminalProgress::new()?);
                let result = session.run::<OutputContainer>(terminal.clone());
                terminal.finish();
                result?
            } else {
                session.run::<OutputContainer>(Arc::new(NoOpProgress))?
            };

            println!(
                "{} {}",
                "wrote".green().bold(),
                written.display().to_string().green()
            );
        }
        Commands::Probe { input, json } => {
            let source = MediaSource::open(&input)?;
            let video = source.video_info();
            let audio = source.audio_info();
            let duration = source.duration();

            if json {
                let payload = json!({
                    "path": source.path(),
                    "duration_seconds": duration.as_secs_f64(),
                    "video": video.map(|video| json!({
                        "width": video.width,
                        "height": video.height,
                        "fps": video.frame_rate,
                        "rotation": video.rotation,
                    })),
                    "audio": audio.map(|audio| json!({
                        "sample_rate": audio.sample_rate,
                        "channels": audio.channels,
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Duration: {duration:?}");
                if let Some(video) = video {
                    println!(
                        "Video: {}x{} @ {:.2} fps{}",
                        video.width,
                        video.height,
                        video.frame_rate,
                        video
                            .rotation
                            .map(|degrees| format!(", rotation {degrees}°"))
                            .unwrap_or_default(),
                    );
                }
                if let Some(audio) = audio {
                    println!("Audio: {} Hz, {} ch", audio.sample_rate, audio.channels);
                }
                if video.is_none() && audio.is_none() {
                    println!("No video or audio tracks");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "recompress", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
