pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod subtitle;
pub mod transcribe;

pub use config::{Config, RunConfig};
pub use error::{ResubError, Result};
pub use pipeline::{
    generate_subtitles, generate_subtitles_with_cancel, print_summary, run, PipelineResult,
    PipelineStats,
};
