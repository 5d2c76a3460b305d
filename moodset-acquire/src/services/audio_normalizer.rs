//! Raw media → canonical mono waveform
//!
//! **Pipeline:**
//! 1. Transcode to `{id}_temp.wav` at the target rate (channels preserved)
//! 2. Wait until the temp file is complete and its header parses
//! 3. Average channels to mono (integer samples rounded to nearest)
//! 4. Truncate to `rate * seconds` samples, never pad
//! 5. Write `{id}.wav.part`, sync, rename to `{id}.wav`
//! 6. Delete temp and raw files
//!
//! Temp and staging files are removed on every failure path. The raw file is
//! kept when normalization fails so the download can be inspected.

use crate::types::{
    canonical_path, staging_path, temp_waveform_path, CanonicalWaveform, NormalizeError, RawMedia,
    Transcoder,
};
use crate::utils::{remove_quietly, sync_file, wait_until_ready, ReadyPoll};
use moodset_common::config::TargetLength;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Produces canonical waveforms through an injected [`Transcoder`]
pub struct AudioNormalizer {
    transcoder: Arc<dyn Transcoder>,
    ready_poll: ReadyPoll,
}

impl AudioNormalizer {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            ready_poll: ReadyPoll::default(),
        }
    }

    pub fn with_ready_poll(mut self, poll: ReadyPoll) -> Self {
        self.ready_poll = poll;
        self
    }

    /// Normalize one raw download into `{id}.wav` next to it
    pub async fn normalize(
        &self,
        raw: &RawMedia,
        target_sample_rate: u32,
        max_length: TargetLength,
    ) -> Result<CanonicalWaveform, NormalizeError> {
        let dir = raw.path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let temp_path = temp_waveform_path(&dir, &raw.identifier);
        let final_path = canonical_path(&dir, &raw.identifier);
        let part_path = staging_path(&final_path);

        let result = self
            .produce(raw, &temp_path, &part_path, &final_path, target_sample_rate, max_length)
            .await;

        // Intermediates never outlive the call
        remove_quietly(&temp_path);
        remove_quietly(&part_path);

        let sample_count = result?;

        if raw.path != final_path {
            remove_quietly(&raw.path);
        }

        info!(
            identifier = %raw.identifier,
            path = %final_path.display(),
            sample_rate = target_sample_rate,
            samples = sample_count,
            "Normalized waveform"
        );

        Ok(CanonicalWaveform {
            path: final_path,
            identifier: raw.identifier.clone(),
            sample_rate: target_sample_rate,
            channels: 1,
            sample_count,
            target_length: max_length,
        })
    }

    async fn produce(
        &self,
        raw: &RawMedia,
        temp_path: &Path,
        part_path: &Path,
        final_path: &Path,
        target_sample_rate: u32,
        max_length: TargetLength,
    ) -> Result<usize, NormalizeError> {
        debug!(
            transcoder = self.transcoder.name(),
            input = %raw.path.display(),
            "Transcoding raw media"
        );
        self.transcoder
            .transcode(&raw.path, temp_path, target_sample_rate)
            .await?;

        wait_until_ready(temp_path, self.ready_poll).await?;

        let temp: PathBuf = temp_path.to_path_buf();
        let part: PathBuf = part_path.to_path_buf();
        let max_samples = max_length.max_samples(target_sample_rate);
        let sample_count = tokio::task::spawn_blocking(move || {
            write_mono(&temp, &part, target_sample_rate, max_samples)
        })
        .await
        .map_err(|e| NormalizeError::Task(e.to_string()))??;

        tokio::fs::rename(part_path, final_path).await?;
        Ok(sample_count)
    }
}

/// Load `input`, collapse to mono, truncate, write `output` in the same sample format
fn write_mono(
    input: &Path,
    output: &Path,
    expected_rate: u32,
    max_samples: Option<usize>,
) -> Result<usize, NormalizeError> {
    let mut reader = hound::WavReader::open(input)?;
    let spec = reader.spec();

    if spec.sample_rate != expected_rate {
        return Err(NormalizeError::Transcode(format!(
            "transcoder produced {} Hz, expected {} Hz",
            spec.sample_rate, expected_rate
        )));
    }
    let channels = usize::from(spec.channels.max(1));

    let out_spec = hound::WavSpec {
        channels: 1,
        sample_rate: expected_rate,
        bits_per_sample: spec.bits_per_sample,
        sample_format: spec.sample_format,
    };

    let written = match spec.sample_format {
        hound::SampleFormat::Int => {
            let samples = reader.samples::<i32>().collect::<Result<Vec<_>, _>>()?;
            let mut mono = downmix_int(&samples, channels);
            truncate(&mut mono, max_samples);

            let mut writer = hound::WavWriter::create(output, out_spec)?;
            for sample in &mono {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
            mono.len()
        }
        hound::SampleFormat::Float => {
            let samples = reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?;
            let mut mono = downmix_float(&samples, channels);
            truncate(&mut mono, max_samples);

            let mut writer = hound::WavWriter::create(output, out_spec)?;
            for sample in &mono {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
            mono.len()
        }
    };

    sync_file(output)?;

    debug!(
        input_channels = channels,
        bits = spec.bits_per_sample,
        samples = written,
        "Wrote mono waveform"
    );
    Ok(written)
}

/// Average interleaved integer frames, rounding to nearest
pub(crate) fn downmix_int(samples: &[i32], channels: usize) -> Vec<i32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i64 = frame.iter().map(|&s| i64::from(s)).sum();
            (sum as f64 / channels as f64).round() as i32
        })
        .collect()
}

/// Average interleaved float frames
pub(crate) fn downmix_float(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn truncate<T>(samples: &mut Vec<T>, max_samples: Option<usize>) {
    if let Some(max) = max_samples {
        samples.truncate(max);
    }
}
