use crate::audio::{load_waveform, normalize, segment, slice_cues, DumpDir, Waveform};
use crate::config::RunConfig;
use crate::error::{ResubError, Result};
use crate::subtitle::{self, Cue};
use crate::transcribe::{Recognizer, TranscriptionOrchestrator};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Statistics from a re-transcription run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total time taken for the entire pipeline.
    pub total_time: Duration,
    /// Time taken to decode the audio.
    pub load_time: Duration,
    /// Time taken for recognition.
    pub transcription_time: Duration,
    /// Number of cues processed.
    pub cues: usize,
    /// Cues whose audio range was empty.
    pub empty_cues: usize,
    /// Number of diagnostic slices written.
    pub dumps_written: usize,
    /// Total audio duration.
    pub audio_duration: Duration,
    /// Engine used for recognition.
    pub engine: String,
}

/// Result of a re-transcription run.
#[derive(Debug)]
pub struct PipelineResult {
    /// Path to the output subtitle file.
    pub output_path: PathBuf,
    /// Cues as written, carrying the recognized text.
    pub cues: Vec<Cue>,
    /// Directory holding the committed audio dumps, if requested.
    pub dump_dir: Option<PathBuf>,
    /// Pipeline statistics.
    pub stats: PipelineStats,
}

/// Re-transcribe subtitle text against an already decoded waveform.
///
/// Parsing completes before any audio is sliced and slicing completes
/// before the first recognition call. Output cue *i* keeps the index and
/// timing of input cue *i*.
pub async fn run(
    subtitle_text: &str,
    waveform: &Waveform,
    language: &str,
    recognizer: &Recognizer,
) -> Result<String> {
    let cues = subtitle::parse(subtitle_text)?;
    let buffers = segment(waveform, &cues)?;
    ensure_aligned(cues.len(), buffers.len())?;

    let (texts, _stats) = TranscriptionOrchestrator::new()
        .with_progress(false)
        .process(recognizer, &cues, &buffers, language)
        .await?;

    let updated = replace_text(&cues, texts)?;
    Ok(subtitle::write(&updated))
}

/// Re-transcribe a subtitle file against its audio file.
///
/// This is the main entry point for resub. It:
/// 1. Parses the source subtitles
/// 2. Decodes the audio
/// 3. Slices one buffer per cue (optionally dumping the raw slices)
/// 4. Recognizes every cue in order
/// 5. Writes the destination file
pub async fn generate_subtitles(
    run_config: &RunConfig,
    recognizer: &Recognizer,
) -> Result<PipelineResult> {
    let cancelled = Arc::new(AtomicBool::new(false));
    generate_subtitles_with_cancel(run_config, recognizer, cancelled).await
}

/// Re-transcribe with cancellation support.
///
/// On any error the destination file is left untouched and staged audio
/// dumps are removed.
pub async fn generate_subtitles_with_cancel(
    run_config: &RunConfig,
    recognizer: &Recognizer,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult> {
    let start_time = Instant::now();
    run_config.validate()?;

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Subtitle Parsing
    // ═══════════════════════════════════════════════════════════════════════
    let subtitle_path = &run_config.subtitle_path;
    info!("Stage 1/4: Parsing subtitles from {:?}", subtitle_path);

    if !subtitle_path.exists() {
        return Err(ResubError::FileNotFound(subtitle_path.display().to_string()));
    }
    let subtitle_text = fs::read_to_string(subtitle_path)?;
    let cues = subtitle::parse(&subtitle_text)?;
    info!("Parsed {} cues", cues.len());

    check_cancelled(&cancelled)?;

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Audio Loading and Segmentation
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 2/4: Loading audio from {:?}", run_config.audio_path);
    let load_start = Instant::now();
    let waveform = load_waveform(&run_config.audio_path)?;
    let load_time = load_start.elapsed();
    let audio_duration = waveform.duration();

    check_cancelled(&cancelled)?;

    let slices = slice_cues(&waveform, &cues);
    drop(waveform);

    let mut dump = match run_config.dump_dir {
        Some(ref target) => {
            let mut dump = DumpDir::create(target)?;
            for (position, slice) in slices.iter().enumerate() {
                dump.write_segment(position, slice)?;
            }
            debug!("Staged {} audio dumps", dump.len());
            Some(dump)
        }
        None => None,
    };
    let dumps_written = dump.as_ref().map_or(0, DumpDir::len);

    let buffers = slices
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>>>()?;
    drop(slices);
    ensure_aligned(cues.len(), buffers.len())?;

    check_cancelled(&cancelled)?;

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Recognition
    // ═══════════════════════════════════════════════════════════════════════
    info!(
        "Stage 3/4: Recognizing {} cues with {} ({})",
        cues.len(),
        recognizer.engine_name(),
        run_config.model
    );
    let transcription_start = Instant::now();

    let (texts, transcription_stats) = TranscriptionOrchestrator::new()
        .with_progress(run_config.show_progress)
        .with_cancel(cancelled.clone())
        .process(recognizer, &cues, &buffers, &run_config.language)
        .await?;

    let transcription_time = transcription_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 4: Subtitle Writing
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 4/4: Writing {:?}", run_config.output_path);

    let updated = replace_text(&cues, texts)?;
    let content = subtitle::write(&updated);

    check_cancelled(&cancelled)?;

    // Dumps only appear once the destination is staged and can be renamed
    let staged = stage_output(&run_config.output_path, &content)?;
    let dump_dir = match dump.take() {
        Some(dump) => Some(dump.commit()?),
        None => None,
    };
    if let Err(e) = persist_output(staged, &run_config.output_path) {
        if let Some(ref dir) = dump_dir {
            let _ = fs::remove_dir_all(dir);
        }
        return Err(e);
    }

    info!(
        "Wrote {} cues to {:?}",
        updated.len(),
        run_config.output_path
    );

    let stats = PipelineStats {
        total_time: start_time.elapsed(),
        load_time,
        transcription_time,
        cues: updated.len(),
        empty_cues: transcription_stats.empty_cues,
        dumps_written,
        audio_duration,
        engine: recognizer.engine_name().to_string(),
    };

    Ok(PipelineResult {
        output_path: run_config.output_path.clone(),
        cues: updated,
        dump_dir,
        stats,
    })
}

/// Fail when per-cue results no longer line up with the cues.
pub(crate) fn ensure_aligned(cues: usize, results: usize) -> Result<()> {
    if cues != results {
        return Err(ResubError::Segmentation {
            cues,
            buffers: results,
        });
    }
    Ok(())
}

fn replace_text(cues: &[Cue], texts: Vec<String>) -> Result<Vec<Cue>> {
    ensure_aligned(cues.len(), texts.len())?;
    Ok(cues
        .iter()
        .zip(texts)
        .map(|(cue, text)| cue.with_text(text))
        .collect())
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        return Err(ResubError::Cancelled);
    }
    Ok(())
}

/// Write the content to a temp file in the destination directory.
fn stage_output(output: &Path, content: &str) -> Result<NamedTempFile> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Rename a staged file onto the destination.
fn persist_output(staged: NamedTempFile, output: &Path) -> Result<()> {
    staged.persist(output).map_err(|e| ResubError::Io(e.error))?;
    Ok(())
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                  Subtitle Re-transcription Complete            ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", result.output_path.display());
    println!(
        "  Cues:       {} ({} without audio)",
        result.stats.cues, result.stats.empty_cues
    );
    println!("  Engine:     {}", result.stats.engine);
    println!(
        "  Duration:   {:.1}s audio",
        result.stats.audio_duration.as_secs_f64()
    );
    if let Some(ref dir) = result.dump_dir {
        println!(
            "  Dumps:      {} slices in {}",
            result.stats.dumps_written,
            dir.display()
        );
    }
    println!();
    println!("  Timing:");
    println!(
        "    Load:        {:.2}s",
        result.stats.load_time.as_secs_f64()
    );
    println!(
        "    Recognize:   {:.2}s",
        result.stats.transcription_time.as_secs_f64()
    );
    println!(
        "    Total:       {:.2}s",
        result.stats.total_time.as_secs_f64()
    );
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
