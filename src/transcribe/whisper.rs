use crate::error::{ResubError, Result};
use crate::transcribe::{RecognitionEngine, TranscriptSegment};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default transcription model.
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Maximum file size for Whisper API (25 MB).
const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// Maximum retries for API calls.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

/// Client for an OpenAI-compatible `audio/transcriptions` endpoint.
///
/// The underlying HTTP client (and its connection pool) is created once and
/// reused for every cue.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry_delay: Duration,
}

impl WhisperClient {
    /// Create a client for the OpenAI endpoint with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            retry_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }

    /// Create a client for a self-hosted server that needs no API key.
    pub fn without_key() -> Self {
        Self {
            api_key: None,
            ..Self::new(String::new())
        }
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound each request; a hung server otherwise blocks the run.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Set the base delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    /// Build the multipart form for the API request.
    fn build_form(&self, wav: Vec<u8>, language: &str) -> Result<Form> {
        let file_part = Part::bytes(wav)
            .file_name("cue.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if !language.is_empty() {
            form = form.text("language", language.to_string());
        }

        Ok(form)
    }

    /// Make the API request (form is consumed, so no retries at this level).
    async fn call_api(&self, form: Form) -> std::result::Result<WhisperResponse, ApiFailure> {
        let mut request = self.client.post(self.endpoint()).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(ApiFailure::retryable)?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        if status.is_success() {
            let body = response.text().await.map_err(ApiFailure::retryable)?;
            debug!("Whisper API response: {}", truncate(&body, 500));
            return serde_json::from_str(&body).map_err(ApiFailure::fatal);
        }

        let error_body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
            Ok(api_error) => format!(
                "Whisper API error ({}): {} ({})",
                status, api_error.error.message, api_error.error.r#type
            ),
            Err(_) => format!("Whisper API error ({}): {}", status, error_body),
        };

        // Client errors will not improve on retry
        let failure = if status.is_client_error() {
            ApiFailure::fatal(ResubError::Api(message))
        } else {
            ApiFailure::retryable(ResubError::Api(message))
        };
        Err(failure)
    }

    /// Transcribe with retry logic - rebuilds form on each attempt.
    async fn transcribe_with_retry(&self, wav: &[u8], language: &str) -> Result<WhisperResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * 2u32.pow(attempt - 1);
                debug!("Retry attempt {} after {:?} delay", attempt, delay);
                tokio::time::sleep(delay).await;
            }

            let form = self.build_form(wav.to_vec(), language)?;

            match self.call_api(form).await {
                Ok(response) => return Ok(response),
                Err(failure) if !failure.retryable => return Err(failure.error),
                Err(failure) => {
                    warn!("Attempt {} failed: {}", attempt + 1, failure.error);
                    last_error = Some(failure.error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ResubError::Api("Unknown error".to_string())))
    }
}

#[async_trait]
impl RecognitionEngine for WhisperClient {
    async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>> {
        let wav = encode_wav(samples, sample_rate)?;
        if wav.len() > MAX_FILE_SIZE {
            return Err(ResubError::Api(format!(
                "Audio too large for Whisper API: {} bytes (max {} bytes)",
                wav.len(),
                MAX_FILE_SIZE
            )));
        }

        debug!(
            "Sending {} samples ({} bytes) to {} with model {}",
            samples.len(),
            wav.len(),
            self.endpoint(),
            self.model
        );

        let response = self.transcribe_with_retry(&wav, language).await?;
        Ok(parse_response(response))
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

/// Encode mono float samples as a 16-bit PCM WAV in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| ResubError::Api(format!("Failed to encode audio: {e}"));

    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).map_err(wav_error)?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(value).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(bytes)
}

/// Convert a Whisper API response into segments.
fn parse_response(response: WhisperResponse) -> Vec<TranscriptSegment> {
    match response.segments {
        Some(api_segments) if !api_segments.is_empty() => api_segments
            .into_iter()
            .map(|seg| TranscriptSegment {
                start: Duration::from_secs_f64(seg.start.max(0.0)),
                end: Duration::from_secs_f64(seg.end.max(0.0)),
                text: seg.text,
            })
            .collect(),
        _ if response.text.trim().is_empty() => Vec::new(),
        // Fallback: a single untimed segment with the full text
        _ => vec![TranscriptSegment {
            start: Duration::ZERO,
            end: Duration::from_secs_f64(response.duration.unwrap_or(0.0).max(0.0)),
            text: response.text,
        }],
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

struct ApiFailure {
    error: ResubError,
    retryable: bool,
}

impl ApiFailure {
    fn retryable(error: impl Into<ResubError>) -> Self {
        Self {
            error: error.into(),
            retryable: true,
        }
    }

    fn fatal(error: impl Into<ResubError>) -> Self {
        Self {
            error: error.into(),
            retryable: false,
        }
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    r#type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_base_url() {
        let client = WhisperClient::without_key().with_base_url("http://localhost:8000/v1/");
        assert_eq!(client.endpoint(), "http://localhost:8000/v1/audio/transcriptions");

        let client = WhisperClient::new("sk-test".to_string());
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/audio/transcriptions");
        assert_eq!(client.model(), "whisper-1");
    }

    #[test]
    fn test_parse_response_with_segments() {
        let response: WhisperResponse = serde_json::from_str(
            r#"{
                "text": "Bonjour. Au revoir.",
                "language": "french",
                "duration": 4.0,
                "segments": [
                    {"id": 0, "start": 0.0, "end": 2.0, "text": " Bonjour."},
                    {"id": 1, "start": 2.5, "end": 4.0, "text": " Au revoir."}
                ]
            }"#,
        )
        .unwrap();

        let segments = parse_response(response);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, " Bonjour.");
        assert_eq!(segments[1].start, Duration::from_millis(2500));
    }

    #[test]
    fn test_parse_response_without_segments() {
        let response: WhisperResponse =
            serde_json::from_str(r#"{"text": "Hello world"}"#).unwrap();

        let segments = parse_response(response);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[0].start, Duration::ZERO);
    }

    #[test]
    fn test_parse_response_silence() {
        let response: WhisperResponse =
            serde_json::from_str(r#"{"text": "", "segments": []}"#).unwrap();
        assert!(parse_response(response).is_empty());
    }

    #[test]
    fn test_encode_wav_header() {
        let bytes = encode_wav(&[0.0, 0.5, -1.0], 16_000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16_383, -32_767]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
