pub mod orchestrator;
pub mod whisper;

pub use orchestrator::{TranscriptionOrchestrator, TranscriptionStats};
pub use whisper::WhisperClient;

use crate::audio::SampleBuffer;
use crate::error::{ResubError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// A piece of recognized speech, timed relative to the start of its buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// A speech-to-text backend.
///
/// Engines are treated as expensive to set up: one instance is initialized
/// once per run and then reused for every cue.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Owns the single engine instance for a run and turns buffers into cue text.
pub struct Recognizer {
    engine: Box<dyn RecognitionEngine>,
}

impl Recognizer {
    /// Initialize the engine and wrap it.
    pub async fn start(engine: Box<dyn RecognitionEngine>) -> Result<Self> {
        debug!("Initializing recognition engine {}", engine.name());
        engine.initialize().await?;
        Ok(Self { engine })
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Recognize one cue's buffer.
    ///
    /// Returns the segment texts concatenated in chronological order with no
    /// separator. An empty buffer yields an empty string without calling the
    /// engine.
    pub async fn recognize(
        &self,
        cue_index: u64,
        buffer: &SampleBuffer,
        language: &str,
    ) -> Result<String> {
        if buffer.is_empty() {
            debug!("Cue {} has no audio, skipping recognition", cue_index);
            return Ok(String::new());
        }

        if !buffer.is_normalized() {
            return Err(ResubError::Recognition {
                index: cue_index,
                message: format!(
                    "expected mono 16kHz input, got {} channel(s) at {} Hz",
                    buffer.channels, buffer.sample_rate
                ),
            });
        }

        let mut segments = self
            .engine
            .transcribe(&buffer.samples, buffer.sample_rate, language)
            .await
            .map_err(|e| ResubError::Recognition {
                index: cue_index,
                message: e.to_string(),
            })?;

        segments.sort_by_key(|s| s.start);
        let text: String = segments.iter().map(|s| s.text.as_str()).collect();

        debug!("Cue {} recognized: {:?}", cue_index, text);
        Ok(text)
    }

    /// Release the engine.
    pub async fn shutdown(self) -> Result<()> {
        debug!("Shutting down recognition engine {}", self.engine.name());
        self.engine.shutdown().await
    }
}
