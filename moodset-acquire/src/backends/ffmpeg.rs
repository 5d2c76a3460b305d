//! Transcoding through an ffmpeg child process

use super::run_tool;
use crate::types::{NormalizeError, Transcoder};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Transcoder that shells out to `ffmpeg`
///
/// Produces 16-bit PCM WAV at the requested rate with the source channel
/// count. Handles every container yt-dlp can return (webm/opus included).
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

fn ffmpeg_args(input: &Path, output: &Path, sample_rate: u32) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into(), "-y".into()];
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());
    args.push("-vn".into());
    args.push("-ar".into());
    args.push(sample_rate.to_string().into());
    args.extend(["-acodec", "pcm_s16le", "-f", "wav"].into_iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn transcode(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<(), NormalizeError> {
        debug!(
            input = %input.display(),
            output = %output.display(),
            sample_rate,
            "Transcoding with ffmpeg"
        );

        run_tool(&self.program, ffmpeg_args(input, output, sample_rate), self.timeout)
            .await
            .map_err(|e| NormalizeError::Transcode(e.to_string()))?;

        Ok(())
    }
}
