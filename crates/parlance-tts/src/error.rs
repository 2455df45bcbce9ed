//! Error types for speech synthesis

use thiserror::Error;

/// TTS error types
#[derive(Error, Debug)]
pub enum TtsError {
    /// Provider is not available or not installed
    #[error("Speech provider not available: {0}")]
    ProviderNotAvailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Synthesis failed
    #[error("Synthesis failed: {0}")]
    SynthesisError(String),

    /// Audio output error
    #[error("Audio output error: {0}")]
    AudioError(String),

    /// IO error (process spawning, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error talking to a cloud provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Playback was cancelled mid-attempt (barge-in or shutdown)
    #[error("Playback cancelled")]
    Cancelled,

    /// Every provider in the fallback chain failed
    #[error("All speech providers failed")]
    ProviderExhausted,
}

/// Result type for TTS operations
pub type TtsResult<T> = Result<T, TtsError>;
