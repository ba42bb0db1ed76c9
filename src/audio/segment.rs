use std::ops::Range;
use std::time::Duration;

use tracing::debug;

use crate::error::{ResubError, Result};
use crate::subtitle::Cue;

use super::{SampleBuffer, Waveform, TARGET_SAMPLE_RATE};

const RESAMPLE_CHUNK: usize = 1024;

/// Frame range covered by a cue, clamped to the available audio.
///
/// Bounds are `round(ms * rate / 1000)`; a cue that starts at or after its
/// clamped end gets an empty range.
pub fn sample_range(cue: &Cue, sample_rate: u32, total_frames: usize) -> Range<usize> {
    let start = to_frame(cue.start, sample_rate).min(total_frames);
    let end = to_frame(cue.end, sample_rate).min(total_frames);
    if start >= end {
        start..start
    } else {
        start..end
    }
}

fn to_frame(at: Duration, sample_rate: u32) -> usize {
    let scaled = at.as_millis() * u128::from(sample_rate);
    let rounded = (scaled + 500) / 1000;
    usize::try_from(rounded).unwrap_or(usize::MAX)
}

/// Cut the raw audio for every cue, keeping the source rate and channel layout.
pub fn slice_cues(waveform: &Waveform, cues: &[Cue]) -> Vec<SampleBuffer> {
    let channels = usize::from(waveform.channels.max(1));
    let total_frames = waveform.frames();

    cues.iter()
        .map(|cue| {
            let range = sample_range(cue, waveform.sample_rate, total_frames);
            debug!(
                "Cue {}: {:.3}s, frames {}..{} of {}",
                cue.index,
                cue.duration().as_secs_f64(),
                range.start,
                range.end,
                total_frames
            );
            SampleBuffer {
                samples: waveform.samples[range.start * channels..range.end * channels].to_vec(),
                sample_rate: waveform.sample_rate,
                channels: waveform.channels,
            }
        })
        .collect()
}

/// Downmix to mono and resample to 16 kHz.
pub fn normalize(buffer: &SampleBuffer) -> Result<SampleBuffer> {
    if buffer.is_empty() {
        return Ok(SampleBuffer::empty(TARGET_SAMPLE_RATE, 1));
    }

    let mono = downmix(&buffer.samples, buffer.channels);
    let samples = resample(&mono, buffer.sample_rate, TARGET_SAMPLE_RATE)?
        .into_iter()
        .map(|s| s.clamp(-1.0, 1.0))
        .collect();

    Ok(SampleBuffer {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
        channels: 1,
    })
}

/// One buffer per cue, in cue order, ready for recognition.
pub fn segment(waveform: &Waveform, cues: &[Cue]) -> Result<Vec<SampleBuffer>> {
    slice_cues(waveform, cues).iter().map(normalize).collect()
}

fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited sinc resampler.
///
/// The output is `round(len * to / from)` frames long, aligned with the
/// input: the resampler's delay is skipped and the tail is flushed with
/// silence.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| ResubError::AudioLoad(format!("resampler init: {}", e)))?;

    let expected_len = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + RESAMPLE_CHUNK);
    let mut chunks = samples.chunks(RESAMPLE_CHUNK);

    while output.len() < delay + expected_len {
        let mut input = chunks.next().map(<[f32]>::to_vec).unwrap_or_default();
        input.resize(RESAMPLE_CHUNK, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| ResubError::AudioLoad(format!("resample: {}", e)))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    output.drain(..delay);
    output.truncate(expected_len);
    Ok(output)
}
