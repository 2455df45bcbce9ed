//! Core types for speech recognition

use parlance_acoustics::VoiceSignature;
use serde::{Deserialize, Serialize};

/// Normalized recognition event, identical across backends.
///
/// Interim events are advisory only and never trigger processing; final
/// events are the unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionEvent {
    pub text: String,
    pub is_final: bool,
    /// Backend confidence in [0,1]; backends without scores report 1.0.
    pub confidence: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Speaker-attributed utterance produced by the ambient capture loop.
/// Immutable once created; the listener receiving it owns forwarding.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub timestamp_ms: u64,
    pub confidence: f32,
    pub speaker_id: Option<String>,
    pub signature: Option<VoiceSignature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Cloud,
    LocalOffline,
    /// Prefer Cloud when its credential is present, else LocalOffline.
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttBackendConfig {
    pub kind: BackendKind,
    pub wake_word: Option<String>,
    pub locale: String,
}

impl Default for SttBackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Auto,
            wake_word: None,
            locale: "en-US".to_string(),
        }
    }
}

/// Wall-clock timestamp for event stamping.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
