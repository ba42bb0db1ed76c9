use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{ResubError, Result};

use super::SampleBuffer;

/// Staging area for per-cue diagnostic WAV files.
///
/// Files are written to a hidden directory next to the target and only
/// appear under the target path once [`DumpDir::commit`] succeeds. Dropping
/// an uncommitted dump removes everything written so far.
pub struct DumpDir {
    target: PathBuf,
    staging: Option<TempDir>,
    written: usize,
}

impl DumpDir {
    pub fn create(target: &Path) -> Result<Self> {
        if target.exists() {
            let mut entries = fs::read_dir(target).map_err(|e| {
                ResubError::Config(format!(
                    "Dump directory {} is not a readable directory: {e}",
                    target.display()
                ))
            })?;
            if entries.next().is_some() {
                return Err(ResubError::Config(format!(
                    "Dump directory {} already exists and is not empty",
                    target.display()
                )));
            }
        }

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".resub-dump-")
            .tempdir_in(&parent)?;
        debug!("Staging audio dumps in {:?}", staging.path());

        Ok(Self {
            target: target.to_path_buf(),
            staging: Some(staging),
            written: 0,
        })
    }

    /// Write one cue's raw slice as `segment_NNNN.wav`, numbered by position.
    pub fn write_segment(&mut self, position: usize, buffer: &SampleBuffer) -> Result<PathBuf> {
        let staging = self
            .staging
            .as_ref()
            .ok_or_else(|| ResubError::Config("Dump directory already committed".to_string()))?;
        let path = staging.path().join(format!("segment_{:04}.wav", position));

        let spec = WavSpec {
            channels: buffer.channels.max(1),
            sample_rate: buffer.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let wav_error = |e: hound::Error| {
            ResubError::Io(std::io::Error::other(format!(
                "Failed to write {}: {e}",
                path.display()
            )))
        };

        let mut writer = WavWriter::create(&path, spec).map_err(wav_error)?;
        for &sample in &buffer.samples {
            writer.write_sample(sample).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;

        self.written += 1;
        Ok(self.target.join(format!("segment_{:04}.wav", position)))
    }

    /// Number of slices written so far.
    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Move the staged files into place under the target path.
    pub fn commit(mut self) -> Result<PathBuf> {
        let staging = self
            .staging
            .take()
            .ok_or_else(|| ResubError::Config("Dump directory already committed".to_string()))?;

        if self.target.exists() {
            fs::remove_dir(&self.target)?;
        }

        let staged = staging.keep();
        if let Err(e) = fs::rename(&staged, &self.target) {
            let _ = fs::remove_dir_all(&staged);
            return Err(e.into());
        }

        info!(
            "Wrote {} audio dumps to {}",
            self.written,
            self.target.display()
        );
        Ok(self.target.clone())
    }
}

impl Drop for DumpDir {
    fn drop(&mut self) {
        let discarded = !self.is_empty();
        if let Some(staging) = self.staging.take() {
            if discarded {
                warn!(
                    "Discarding {} uncommitted audio dumps in {:?}",
                    self.written,
                    staging.path()
                );
            }
            // TempDir removes the staged files on drop
        }
    }
}
