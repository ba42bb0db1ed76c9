use crate::audio::TARGET_SAMPLE_RATE;
use crate::error::{ResubError, Result};
use crate::transcribe::whisper::{DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persistent settings: config file plus environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub language: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language: "en".to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    ResubError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("RESUB_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Ok(model) = std::env::var("RESUB_MODEL") {
            self.model = model;
        }
        if let Ok(language) = std::env::var("RESUB_LANGUAGE") {
            self.language = language;
        }
        if let Ok(timeout) = std::env::var("RESUB_REQUEST_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.request_timeout_secs = t;
            }
        }
    }

    /// Whether requests go to the hosted OpenAI API.
    pub fn uses_openai(&self) -> bool {
        self.api_base_url.trim_end_matches('/') == DEFAULT_API_BASE_URL
    }

    pub fn validate(&self) -> Result<()> {
        if self.uses_openai() && self.openai_api_key.is_none() {
            return Err(ResubError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-... \
                 or point RESUB_API_BASE_URL at a self-hosted server"
                    .to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ResubError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("resub").join("config.toml"))
    }
}

/// Everything a single run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Source subtitle file.
    pub subtitle_path: PathBuf,
    /// Source audio (or video) file.
    pub audio_path: PathBuf,
    /// Destination subtitle file.
    pub output_path: PathBuf,
    /// Language hint passed to the engine.
    pub language: String,
    /// Recognition model identifier.
    pub model: String,
    /// Sample rate of recognition input.
    pub target_sample_rate: u32,
    /// Optional directory for per-cue raw audio slices.
    pub dump_dir: Option<PathBuf>,
    /// Show progress bars.
    pub show_progress: bool,
}

impl RunConfig {
    pub fn new(
        subtitle_path: impl Into<PathBuf>,
        audio_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self {
            subtitle_path: subtitle_path.into(),
            audio_path: audio_path.into(),
            output_path: output_path.into(),
            language: config.language.clone(),
            model: config.model.clone(),
            target_sample_rate: TARGET_SAMPLE_RATE,
            dump_dir: None,
            show_progress: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(ResubError::Config(
                "Language hint must not be empty".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ResubError::Config(
                "Model identifier must not be empty".to_string(),
            ));
        }

        if self.target_sample_rate != TARGET_SAMPLE_RATE {
            return Err(ResubError::Config(format!(
                "Recognition input must be {} Hz, got {}",
                TARGET_SAMPLE_RATE, self.target_sample_rate
            )));
        }

        if self.output_path == self.subtitle_path {
            return Err(ResubError::Config(
                "Output path must differ from the source subtitle file".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "whisper-1");
        assert_eq!(config.language, "en");
        assert!(config.uses_openai());
    }

    #[test]
    fn test_validate_missing_api_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_with_api_key() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_self_hosted_needs_no_key() {
        let config = Config {
            api_base_url: "http://localhost:8000/v1".to_string(),
            ..Config::default()
        };
        assert!(!config.uses_openai());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("language = \"fr\"\nmodel = \"large-v2\"\n").unwrap();
        assert_eq!(config.language, "fr");
        assert_eq!(config.model, "large-v2");
        assert_eq!(config.request_timeout_secs, 300);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_run_config_from_config() {
        let config = Config {
            language: "fr".to_string(),
            ..Config::default()
        };
        let run = RunConfig::new("in.srt", "audio.wav", "out.srt", &config);

        assert_eq!(run.language, "fr");
        assert_eq!(run.model, "whisper-1");
        assert_eq!(run.target_sample_rate, 16_000);
        assert!(run.dump_dir.is_none());
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_run_config_validation() {
        let config = Config::default();

        let mut run = RunConfig::new("in.srt", "audio.wav", "out.srt", &config);
        run.target_sample_rate = 44_100;
        assert!(run.validate().is_err());

        let mut run = RunConfig::new("in.srt", "audio.wav", "out.srt", &config);
        run.language = " ".to_string();
        assert!(run.validate().is_err());

        let mut run = RunConfig::new("in.srt", "audio.wav", "out.srt", &config);
        run.model.clear();
        assert!(run.validate().is_err());

        let run = RunConfig::new("in.srt", "audio.wav", "in.srt", &config);
        assert!(run.validate().is_err());
    }
}
