use crate::audio::SampleBuffer;
use crate::error::{ResubError, Result};
use crate::subtitle::Cue;
use crate::transcribe::Recognizer;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Statistics from the transcription process.
#[derive(Debug, Clone)]
pub struct TranscriptionStats {
    pub total_cues: usize,
    pub recognized_cues: usize,
    pub empty_cues: usize,
    pub total_time: Duration,
    pub avg_cue_time: Duration,
}

/// Runs recognition over every cue in order, one call at a time.
pub struct TranscriptionOrchestrator {
    show_progress: bool,
    cancelled: Arc<AtomicBool>,
}

impl Default for TranscriptionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptionOrchestrator {
    pub fn new() -> Self {
        Self {
            show_progress: true,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stop before the next cue once this flag is set.
    pub fn with_cancel(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Recognize every buffer, returning one text per cue in cue order.
    ///
    /// The first failure aborts the whole batch.
    pub async fn process(
        &self,
        recognizer: &Recognizer,
        cues: &[Cue],
        buffers: &[SampleBuffer],
        language: &str,
    ) -> Result<(Vec<String>, TranscriptionStats)> {
        if cues.len() != buffers.len() {
            return Err(ResubError::Segmentation {
                cues: cues.len(),
                buffers: buffers.len(),
            });
        }

        let total_cues = cues.len();
        let start_time = Instant::now();

        info!(
            "Recognizing {} cues with {} (language: {})",
            total_cues,
            recognizer.engine_name(),
            language
        );

        let progress_bar = if self.show_progress && total_cues > 0 {
            let pb = ProgressBar::new(total_cues as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut texts = Vec::with_capacity(total_cues);
        let mut empty_cues = 0;

        for (cue, buffer) in cues.iter().zip(buffers) {
            if self.cancelled.load(Ordering::Relaxed) {
                if let Some(ref pb) = progress_bar {
                    pb.abandon_with_message("Cancelled");
                }
                return Err(ResubError::Cancelled);
            }

            let cue_start = Instant::now();
            let result = recognizer.recognize(cue.index, buffer, language).await;

            let text = match result {
                Ok(text) => text,
                Err(e) => {
                    if let Some(ref pb) = progress_bar {
                        pb.abandon_with_message(format!("Failed at cue {}", cue.index));
                    }
                    return Err(e);
                }
            };

            debug!(
                "Cue {} done in {}ms",
                cue.index,
                cue_start.elapsed().as_millis()
            );

            if buffer.is_empty() {
                empty_cues += 1;
            }
            texts.push(text);

            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Transcription complete");
        }

        let total_time = start_time.elapsed();
        let avg_cue_time = if total_cues > 0 {
            total_time / total_cues as u32
        } else {
            Duration::ZERO
        };

        let stats = TranscriptionStats {
            total_cues,
            recognized_cues: total_cues - empty_cues,
            empty_cues,
            total_time,
            avg_cue_time,
        };

        info!(
            "Transcription complete: {} cues ({} without audio) in {:.2}s (avg {:.2}s/cue)",
            total_cues,
            empty_cues,
            total_time.as_secs_f64(),
            avg_cue_time.as_secs_f64()
        );

        Ok((texts, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TARGET_SAMPLE_RATE;
    use crate::transcribe::{RecognitionEngine, TranscriptSegment};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Echoes the number of samples so ordering is observable.
    struct LengthEngine {
        calls: Arc<AtomicUsize>,
        fail_on_len: Option<usize>,
        cancel_after_first: Option<Arc<AtomicBool>>,
    }

    #[async_trait]
    impl RecognitionEngine for LengthEngine {
        async fn transcribe(
            &self,
            samples: &[f32],
            _sample_rate: u32,
            _language: &str,
        ) -> Result<Vec<TranscriptSegment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref flag) = self.cancel_after_first {
                flag.store(true, Ordering::SeqCst);
            }
            if self.fail_on_len == Some(samples.len()) {
                return Err(ResubError::Api("Mock error".to_string()));
            }
            Ok(vec![TranscriptSegment {
                start: Duration::ZERO,
                end: Duration::from_secs(1),
                text: samples.len().to_string(),
            }])
        }

        fn name(&self) -> &'static str {
            "Mock"
        }
    }

    fn cues(count: usize) -> Vec<Cue> {
        (0..count)
            .map(|i| Cue {
                index: (count - i) as u64,
                start: Duration::from_secs(i as u64),
                end: Duration::from_secs(i as u64 + 1),
                text: Vec::new(),
            })
            .collect()
    }

    fn buffers(lengths: &[usize]) -> Vec<SampleBuffer> {
        lengths
            .iter()
            .map(|&len| SampleBuffer {
                samples: vec![0.0; len],
                sample_rate: TARGET_SAMPLE_RATE,
                channels: 1,
            })
            .collect()
    }

    async fn recognizer(
        fail_on_len: Option<usize>,
        cancel_after_first: Option<Arc<AtomicBool>>,
    ) -> (Recognizer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = LengthEngine {
            calls: calls.clone(),
            fail_on_len,
            cancel_after_first,
        };
        (Recognizer::start(Box::new(engine)).await.unwrap(), calls)
    }

    #[tokio::test]
    async fn test_process_empty() {
        let (recognizer, _) = recognizer(None, None).await;
        let orchestrator = TranscriptionOrchestrator::new().with_progress(false);

        let (texts, stats) = orchestrator
            .process(&recognizer, &[], &[], "fr")
            .await
            .unwrap();
        assert!(texts.is_empty());
        assert_eq!(stats.total_cues, 0);
    }

    #[tokio::test]
    async fn test_maintains_cue_order() {
        let (recognizer, calls) = recognizer(None, None).await;
        let orchestrator = TranscriptionOrchestrator::new().with_progress(false);

        let (texts, stats) = orchestrator
            .process(&recognizer, &cues(4), &buffers(&[30, 10, 0, 20]), "fr")
            .await
            .unwrap();

        assert_eq!(texts, vec!["30", "10", "", "20"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.recognized_cues, 3);
        assert_eq!(stats.empty_cues, 1);
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let (recognizer, calls) = recognizer(Some(10), None).await;
        let orchestrator = TranscriptionOrchestrator::new().with_progress(false);

        let batch = cues(3);
        let result = orchestrator
            .process(&recognizer, &batch, &buffers(&[5, 10, 15]), "fr")
            .await;

        match result {
            Err(ResubError::Recognition { index, .. }) => assert_eq!(index, batch[1].index),
            other => panic!("Expected Recognition error, got: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_segmentation_error() {
        let (recognizer, calls) = recognizer(None, None).await;
        let orchestrator = TranscriptionOrchestrator::new().with_progress(false);

        let result = orchestrator
            .process(&recognizer, &cues(3), &buffers(&[1, 2]), "fr")
            .await;
        assert!(matches!(
            result,
            Err(ResubError::Segmentation { cues: 3, buffers: 2 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_between_cues() {
        let flag = Arc::new(AtomicBool::new(false));
        let (recognizer, calls) = recognizer(None, Some(flag.clone())).await;
        let orchestrator = TranscriptionOrchestrator::new()
            .with_progress(false)
            .with_cancel(flag);

        let result = orchestrator
            .process(&recognizer, &cues(3), &buffers(&[1, 2, 3]), "fr")
            .await;
        assert!(matches!(result, Err(ResubError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
