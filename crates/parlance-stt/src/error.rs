use thiserror::Error;

#[derive(Error, Debug)]
pub enum SttError {
    /// Network blips, rate limits, vendor 5xx. The session keeps running.
    #[error("Transient backend error: {0}")]
    Transient(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Audio error: {0}")]
    Audio(#[from] parlance_foundation::AudioError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cancelled")]
    Cancelled,
}

pub type SttResult<T> = Result<T, SttError>;

impl SttError {
    /// Errors the capture loops swallow with a log line and a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SttError::Transient(_) | SttError::TranscriptionFailed(_) | SttError::Http(_)
        )
    }
}
