//! Acoustic analysis for Parlance: per-utterance voice signatures for
//! lightweight speaker attribution, and spectral matching against the
//! engine's own playback to suppress self-echo.

pub mod echo;
pub mod signature;

pub use echo::SelfEchoDetector;
pub use signature::{extract, VoiceSignature};
