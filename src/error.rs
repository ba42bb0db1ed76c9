use crate::subtitle::timecode::TimecodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResubError {
    #[error("Malformed timecode on line {line}: {source}")]
    Timecode {
        line: usize,
        #[source]
        source: TimecodeError,
    },

    #[error("Subtitle parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Audio load failed: {0}")]
    AudioLoad(String),

    #[error("Segmentation mismatch: {cues} cues but {buffers} results")]
    Segmentation { cues: usize, buffers: usize },

    #[error("Recognition failed for cue {index}: {message}")]
    Recognition { index: u64, message: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResubError>;
