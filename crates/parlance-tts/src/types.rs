//! Core types for speech synthesis

use serde::{Deserialize, Serialize};

/// How a reply should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakStyle {
    /// Normal spoken reply.
    Spoken,
    /// Quiet "thinking aloud" delivery; presence reports it as such.
    Whisper,
}

/// Synthesis configuration shared by the whole chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Enable/disable synthesis entirely.
    pub enabled: bool,
    /// Default voice identifier, provider-specific.
    pub default_voice: Option<String>,
    /// Speaking rate in words per minute.
    pub speech_rate: u32,
    /// Volume in [0,1].
    pub volume: f32,
    /// Volume used for whisper-style delivery.
    pub whisper_volume: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_voice: None,
            speech_rate: 180,
            volume: 0.8,
            whisper_volume: 0.35,
        }
    }
}

/// Options for one synthesis call, resolved from config plus style.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub voice: Option<String>,
    pub speech_rate: u32,
    pub volume: f32,
    pub style: SpeakStyle,
}

impl SynthesisOptions {
    pub fn from_config(config: &TtsConfig, style: SpeakStyle) -> Self {
        Self {
            voice: config.default_voice.clone(),
            speech_rate: config.speech_rate,
            volume: match style {
                SpeakStyle::Spoken => config.volume,
                SpeakStyle::Whisper => config.whisper_volume,
            },
            style,
        }
    }
}
