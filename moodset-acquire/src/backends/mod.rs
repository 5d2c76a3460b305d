//! Default collaborator implementations
//!
//! - [`YtDlpBackend`]: search + metadata via the `yt-dlp` tool, downloads over HTTP
//! - [`FfmpegTranscoder`]: intermediate waveform via an `ffmpeg` child process
//! - [`NativeTranscoder`]: in-process symphonia decode + rubato resample

pub mod ffmpeg;
pub mod native;
pub mod yt_dlp;

pub use ffmpeg::FfmpegTranscoder;
pub use native::NativeTranscoder;
pub use yt_dlp::YtDlpBackend;

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// External tool invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Binary missing or not executable
    #[error("Failed to start {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// Tool ran longer than its budget and was killed
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// Tool exited non-zero
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

/// Run a tool to completion and return its stdout
///
/// The child is killed if the timeout elapses (the future is dropped with
/// `kill_on_drop` set).
pub(crate) async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> Result<Vec<u8>, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = program.display().to_string();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::Spawn {
            tool: tool.clone(),
            message: e.to_string(),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ToolError::Spawn {
                tool,
                message: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ToolError::Timeout {
                tool,
                secs: timeout.as_secs(),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::Failed {
            tool,
            status: output.status.to_string(),
            stderr: last_lines(&stderr, 5),
        });
    }

    Ok(output.stdout)
}

/// Keep only the tail of a tool's stderr for error messages
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
