use crate::ambient::AmbientConfig;
use clap::Parser;
use parlance_stt::{BackendKind, LocalBackendConfig, SttBackendConfig};
use parlance_tts::TtsConfig;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum BackendChoice {
    Auto,
    Cloud,
    Local,
}

impl From<BackendChoice> for BackendKind {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Auto => BackendKind::Auto,
            BackendChoice::Cloud => BackendKind::Cloud,
            BackendChoice::Local => BackendKind::LocalOffline,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "parlance", version, about = "Real-time spoken-dialogue engine")]
pub struct Cli {
    /// Speech recognition backend
    #[arg(long, value_enum, env = "PARLANCE_BACKEND", default_value = "auto")]
    pub backend: BackendChoice,

    /// Wake word phrase; omit for always-on listening
    #[arg(long, env = "PARLANCE_WAKE_WORD")]
    pub wake_word: Option<String>,

    #[arg(long, env = "PARLANCE_LOCALE", default_value = "en-US")]
    pub locale: String,

    /// Input device name (system default when omitted)
    #[arg(long, env = "PARLANCE_DEVICE")]
    pub device: Option<String>,

    /// Synthesis voice identifier
    #[arg(long, env = "PARLANCE_VOICE")]
    pub voice: Option<String>,

    /// Deliver replies in the quiet thinking-aloud style
    #[arg(long)]
    pub whisper: bool,

    /// Disable the passive ambient listening loop
    #[arg(long)]
    pub no_ambient: bool,

    /// Minimum word count for an ambient utterance
    #[arg(long, default_value_t = 3)]
    pub min_words: usize,
}

/// Resolved once at startup; everything downstream receives pieces of this.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stt: SttBackendConfig,
    pub local: LocalBackendConfig,
    pub tts: TtsConfig,
    pub ambient: AmbientConfig,
    pub ambient_enabled: bool,
    pub whisper_replies: bool,
    pub device: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> EngineConfig {
        EngineConfig {
            stt: SttBackendConfig {
                kind: self.backend.into(),
                wake_word: self.wake_word,
                locale: self.locale.clone(),
            },
            local: LocalBackendConfig {
                locale: self.locale.clone(),
                ..Default::default()
            },
            tts: TtsConfig {
                default_voice: self.voice,
                ..Default::default()
            },
            ambient: AmbientConfig {
                min_word_count: self.min_words,
                locale: self.locale,
                ..Default::default()
            },
            ambient_enabled: !self.no_ambient,
            whisper_replies: self.whisper,
            device: self.device,
        }
    }
}
