//! Sample-rate conversion with rubato

use crate::types::NormalizeError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Resample interleaved PCM with any channel count
///
/// Uses sinc interpolation with a BlackmanHarris2 window, a 256-tap filter
/// and a 0.95 cutoff. The whole input is processed as a single chunk.
/// Returns the input unchanged when the rates already match.
pub fn resample_interleaved(
    samples: Vec<f32>,
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, NormalizeError> {
    if samples.is_empty() || channels == 0 || source_rate == target_rate {
        return Ok(samples);
    }

    let num_frames = samples.len() / channels;
    if num_frames == 0 {
        return Ok(Vec::new());
    }

    // De-interleave into one Vec per channel
    let mut input_channels: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(num_frames))
        .collect();
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            input_channels[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, num_frames, channels)
        .map_err(|e| NormalizeError::Resample(format!("Failed to create resampler: {}", e)))?;

    let output_channels = resampler
        .process(&input_channels, None)
        .map_err(|e| NormalizeError::Resample(e.to_string()))?;

    // Re-interleave
    let output_frames = output_channels.first().map(Vec::len).unwrap_or(0);
    let mut output = Vec::with_capacity(output_frames * channels);
    for i in 0..output_frames {
        for channel in &output_channels {
            output.push(channel[i]);
        }
    }

    debug!(
        "Resampled {} frames ({} Hz) → {} frames ({} Hz), {} channel(s)",
        num_frames, source_rate, output_frames, target_rate, channels
    );

    Ok(output)
}
