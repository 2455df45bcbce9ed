//! Speech synthesis for Parlance: a sanitizing, cancellable playback
//! coordinator over an ordered fallback chain of providers.

pub mod chain;
pub mod error;
pub mod flags;
pub mod provider;
pub mod providers;
pub mod sanitize;
pub mod types;

pub use chain::PlaybackCoordinator;
pub use error::{TtsError, TtsResult};
pub use flags::SelfSpeechFlag;
pub use provider::{AudioTap, CircuitBreaker, SpeechProvider};
pub use providers::{EspeakProvider, HttpTtsConfig, HttpTtsProvider};
pub use sanitize::sanitize_for_speech;
pub use types::{SpeakStyle, SynthesisOptions, TtsConfig};
