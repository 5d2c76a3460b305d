//! Utility modules

pub mod audio_decoder;
pub mod console;
pub mod fs_ready;
pub mod resampler;
pub mod retry;

pub use audio_decoder::{decode_audio_file, DecodedAudio};
pub use console::{ConsoleOutput, NoopConsole, TerminalConsole};
pub use fs_ready::{remove_quietly, sync_file, wait_until_ready, ReadyPoll};
pub use resampler::resample_interleaved;
pub use retry::RetryPolicy;
