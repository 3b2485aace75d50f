//! Error types for the voice layer.

use thiserror::Error;

/// Result type alias for voice operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the speech/capture coordination layer.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
