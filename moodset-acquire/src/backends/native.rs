//! In-process transcoder: symphonia decode, rubato resample, hound write

use crate::types::{NormalizeError, Transcoder};
use crate::utils::{decode_audio_file, resample_interleaved};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transcoder that needs no external tools
///
/// Output is 16-bit PCM WAV with the source channel count. Limited to the
/// codecs symphonia supports (no Opus).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTranscoder;

impl NativeTranscoder {
    pub fn new() -> Self {
        Self
    }
}

fn transcode_blocking(input: &Path, output: &Path, sample_rate: u32) -> Result<(), NormalizeError> {
    let decoded = decode_audio_file(input)?;
    let channels = decoded.channels;
    let samples = resample_interleaved(decoded.samples, channels, decoded.sample_rate, sample_rate)?;

    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(output, spec)?;
    for sample in &samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32).round() as i16)?;
    }
    writer.finalize()?;

    debug!(
        output = %output.display(),
        frames = samples.len() / channels.max(1),
        channels,
        "Native transcode complete"
    );
    Ok(())
}

#[async_trait::async_trait]
impl Transcoder for NativeTranscoder {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn transcode(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<(), NormalizeError> {
        let input: PathBuf = input.to_path_buf();
        let output: PathBuf = output.to_path_buf();

        tokio::task::spawn_blocking(move || transcode_blocking(&input, &output, sample_rate))
            .await
            .map_err(|e| NormalizeError::Task(e.to_string()))?
    }
}
