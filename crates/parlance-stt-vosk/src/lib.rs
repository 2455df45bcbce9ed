//! Vosk-backed offline transcription for Parlance.
//!
//! The native library and model are optional at build time; without the
//! `vosk` feature this crate only exposes the model-path helper so the app
//! can report a useful configuration error.

#[cfg(feature = "vosk")]
mod transcriber;

#[cfg(feature = "vosk")]
pub use transcriber::VoskTranscriber;

/// Resolve the offline model directory: explicit env var, else the
/// conventional in-repo location.
pub fn default_model_path() -> String {
    std::env::var("PARLANCE_VOSK_MODEL")
        .unwrap_or_else(|_| "models/vosk-model-small-en-us-0.15".to_string())
}
