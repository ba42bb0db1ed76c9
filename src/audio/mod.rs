pub mod dump;
pub mod extract;
pub mod segment;

pub use dump::DumpDir;
pub use extract::{check_ffmpeg, extract_with_ffmpeg, load_waveform};
pub use segment::{normalize, sample_range, segment, slice_cues};

use std::time::Duration;

/// Sample rate the recognition engine expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Fully decoded audio for the whole source file.
///
/// Samples are interleaved and scaled to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    /// Number of samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Get the duration of this waveform.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Audio for a single cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SampleBuffer {
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether this buffer already matches the engine's input contract.
    pub fn is_normalized(&self) -> bool {
        self.sample_rate == TARGET_SAMPLE_RATE && self.channels == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_frames_and_duration() {
        let waveform = Waveform {
            samples: vec![0.0; 16_000 * 2 * 3],
            sample_rate: 16_000,
            channels: 2,
        };
        assert_eq!(waveform.frames(), 48_000);
        assert_eq!(waveform.duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = SampleBuffer::empty(TARGET_SAMPLE_RATE, 1);
        assert!(buffer.is_empty());
        assert!(buffer.is_normalized());
        assert!(!SampleBuffer::empty(44_100, 2).is_normalized());
    }
}
