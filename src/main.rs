use anyhow::{Context, Result};
use clap::Parser;
use resub::config::{Config, RunConfig};
use resub::transcribe::{Recognizer, WhisperClient};
use resub::{generate_subtitles_with_cancel, print_summary};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "resub")]
#[command(version, about = "Re-transcribe subtitle cues from their audio")]
#[command(
    long_about = "Slice the audio at every subtitle cue's timecodes, run each slice through Whisper, and write a new subtitle file with the same indices and timings."
)]
struct Cli {
    /// Source subtitle file (SRT)
    subtitle: PathBuf,

    /// Source audio/video file
    audio: PathBuf,

    /// Output subtitle file (defaults to <subtitle>.updated.srt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Language hint (e.g., en, fr, ja)
    #[arg(short, long)]
    language: Option<String>,

    /// Recognition model identifier (e.g., whisper-1)
    #[arg(short, long)]
    model: Option<String>,

    /// Directory to dump per-cue audio slices for diagnostics
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn derive_output_path(subtitle: &Path) -> PathBuf {
    let stem = subtitle.file_stem().unwrap_or_default();
    let mut output = subtitle.to_path_buf();
    output.set_file_name(format!("{}.updated.srt", stem.to_string_lossy()));
    output
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current cue");
        flag.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl+C handler")?;

    // Load and validate configuration
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| derive_output_path(&cli.subtitle));

    let mut run_config = RunConfig::new(&cli.subtitle, &cli.audio, output, &config);
    if let Some(language) = cli.language {
        run_config.language = language;
    }
    if let Some(model) = cli.model {
        run_config.model = model;
    }
    run_config.dump_dir = cli.dump_dir;
    run_config.show_progress = !cli.no_progress;
    run_config.validate().context("Invalid run configuration")?;

    info!("Subtitles: {}", run_config.subtitle_path.display());
    info!("Audio:     {}", run_config.audio_path.display());
    info!("Output:    {}", run_config.output_path.display());
    info!("Language:  {}", run_config.language);
    info!("Model:     {}", run_config.model);
    if let Some(ref dir) = run_config.dump_dir {
        info!("Dumps:     {}", dir.display());
    }

    let client = match config.openai_api_key {
        Some(ref key) => WhisperClient::new(key.clone()),
        None => WhisperClient::without_key(),
    }
    .with_base_url(config.api_base_url.clone())
    .with_model(run_config.model.clone())
    .with_timeout(Duration::from_secs(config.request_timeout_secs))
    .context("Failed to build HTTP client")?;

    let recognizer = Recognizer::start(Box::new(client))
        .await
        .context("Failed to initialize recognition engine")?;

    let outcome = generate_subtitles_with_cancel(&run_config, &recognizer, cancelled).await;
    recognizer
        .shutdown()
        .await
        .context("Failed to shut down recognition engine")?;

    let result = outcome.context("Re-transcription failed")?;
    print_summary(&result);

    Ok(())
}
