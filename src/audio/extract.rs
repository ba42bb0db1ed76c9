use std::path::Path;
use std::process::Command;

use hound::{SampleFormat, WavReader};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{ResubError, Result};

use super::{Waveform, TARGET_SAMPLE_RATE};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            ResubError::AudioLoad(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ResubError::AudioLoad("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Decode an audio file into a full-length waveform.
///
/// WAV files are read directly. Anything else is first converted by FFmpeg
/// into a temporary mono 16kHz WAV.
pub fn load_waveform(input: &Path) -> Result<Waveform> {
    if !input.exists() {
        return Err(ResubError::AudioLoad(format!(
            "Audio file not found: {}",
            input.display()
        )));
    }

    info!("Loading audio from {}", input.display());

    let is_wav = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if is_wav {
        match decode_wav(input) {
            Ok(waveform) => return Ok(waveform),
            // WAV variants hound cannot read (e.g. extensible ADPCM) still decode through FFmpeg
            Err(e) => debug!("Direct WAV decode failed, falling back to FFmpeg: {e}"),
        }
    }

    let temp_dir = TempDir::new().map_err(|e| {
        ResubError::AudioLoad(format!("Failed to create temp directory: {e}"))
    })?;
    let wav_path = temp_dir.path().join("audio.wav");
    extract_with_ffmpeg(input, &wav_path)?;
    decode_wav(&wav_path)
}

/// Extract the first audio stream of any container into a mono 16kHz PCM WAV.
pub fn extract_with_ffmpeg(input: &Path, output: &Path) -> Result<()> {
    check_ffmpeg()?;

    debug!("Extracting audio with FFmpeg: {:?} -> {:?}", input, output);

    let output_status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
        .arg(TARGET_SAMPLE_RATE.to_string())
        .args(["-ac", "1"])
        .arg(output)
        .output()
        .map_err(|e| ResubError::AudioLoad(format!("Failed to run FFmpeg: {e}")))?;

    if !output_status.status.success() {
        let stderr = String::from_utf8_lossy(&output_status.stderr);
        return Err(ResubError::AudioLoad(format!(
            "FFmpeg audio extraction failed: {}",
            stderr.trim()
        )));
    }

    if !output.exists() {
        return Err(ResubError::AudioLoad(
            "Output file was not created".to_string(),
        ));
    }

    Ok(())
}

fn decode_wav(path: &Path) -> Result<Waveform> {
    let reader = WavReader::open(path)
        .map_err(|e| ResubError::AudioLoad(format!("Failed to open {}: {e}", path.display())))?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(ResubError::AudioLoad(format!(
            "Invalid WAV header in {}",
            path.display()
        )));
    }

    let decode_error =
        |e: hound::Error| ResubError::AudioLoad(format!("Failed to decode {}: {e}", path.display()));

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(decode_error)?,
        SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v as f32 / scale).clamp(-1.0, 1.0)))
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_error)?
        }
    };

    let waveform = Waveform {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    };

    info!(
        "Decoded {:.1}s of audio ({} Hz, {} channel(s))",
        waveform.duration().as_secs_f64(),
        waveform.sample_rate,
        waveform.channels
    );

    Ok(waveform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn test_load_missing_file_is_audio_load_error() {
        let result = load_waveform(Path::new("/nonexistent/audio.wav"));
        match result {
            Err(ResubError::AudioLoad(message)) => assert!(message.contains("nonexistent")),
            other => panic!("Expected AudioLoad error, got: {other:?}"),
        }
    }

    #[test]
    fn test_decode_int_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for sample in [16_384i16, -16_384, i16::MAX, i16::MIN] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let waveform = load_waveform(&path).unwrap();
        assert_eq!(waveform.sample_rate, 22_050);
        assert_eq!(waveform.channels, 2);
        assert_eq!(waveform.frames(), 2);
        assert_eq!(waveform.samples[0], 0.5);
        assert_eq!(waveform.samples[1], -0.5);
        assert!(waveform.samples[2] > 0.999);
        assert_eq!(waveform.samples[3], -1.0);
    }

    #[test]
    fn test_decode_float_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.write_sample(-0.75f32).unwrap();
        writer.finalize().unwrap();

        let waveform = load_waveform(&path).unwrap();
        assert_eq!(waveform.samples, vec![0.25, -0.75]);
    }
}
