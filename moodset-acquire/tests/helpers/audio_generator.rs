//! Audio Test Fixture Generator
//!
//! Utilities for generating test WAV files with various characteristics

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Write 32-bit float samples instead of 16-bit integers
    pub float: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            sample_rate: 44100,
            channels: 2,
            float: false,
        }
    }
}

impl AudioConfig {
    pub fn seconds(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            ..Self::default()
        }
    }

    pub fn frames(&self) -> usize {
        (self.duration_seconds * self.sample_rate as f64) as usize
    }
}

/// Generate a 440 Hz tone at 30% amplitude, same signal on every channel
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: if config.float { 32 } else { 16 },
        sample_format: if config.float {
            hound::SampleFormat::Float
        } else {
            hound::SampleFormat::Int
        },
    };

    let mut writer = hound::WavWriter::create(path, spec)?;

    for i in 0..config.frames() {
        let t = i as f32 / config.sample_rate as f32;
        let value = 0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin();

        for _ in 0..config.channels {
            if config.float {
                writer.write_sample(value)?;
            } else {
                writer.write_sample((value * i16::MAX as f32) as i16)?;
            }
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate a 16-bit WAV whose channels hold fixed, distinct values
pub fn generate_constant_wav(
    path: &Path,
    sample_rate: u32,
    frames: usize,
    channel_values: &[i16],
) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: channel_values.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..frames {
        for value in channel_values {
            writer.write_sample(*value)?;
        }
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate several canonical-looking mono files in a directory
pub fn generate_waveform_dir(dir: &Path, names: &[&str], config: &AudioConfig) -> anyhow::Result<Vec<PathBuf>> {
    names
        .iter()
        .map(|name| generate_test_wav(&dir.join(name), config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_simple_wav() {
        let temp_dir = TempDir::new().unwrap();
        let wav_path = temp_dir.path().join("test.wav");

        generate_test_wav(&wav_path, &AudioConfig::default()).unwrap();

        let reader = hound::WavReader::open(&wav_path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.duration() as usize, AudioConfig::default().frames());
    }
}
