//! Local offline synthesis through the espeak / espeak-ng command.

use crate::error::{TtsError, TtsResult};
use crate::provider::SpeechProvider;
use crate::types::{SpeakStyle, SynthesisOptions};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct EspeakProvider;

impl EspeakProvider {
    pub fn new() -> Self {
        Self
    }

    /// Get the espeak command name (espeak or espeak-ng)
    async fn espeak_command() -> Option<&'static str> {
        if Command::new("espeak").arg("--version").output().await.is_ok() {
            Some("espeak")
        } else if Command::new("espeak-ng")
            .arg("--version")
            .output()
            .await
            .is_ok()
        {
            Some("espeak-ng")
        } else {
            None
        }
    }

    fn build_args(options: &SynthesisOptions) -> Vec<String> {
        let mut args = Vec::new();

        let base_voice = options.voice.clone().unwrap_or_else(|| "en".to_string());
        let voice = match options.style {
            // espeak's whisper variant carries the "thinking aloud" delivery.
            SpeakStyle::Whisper => format!("{}+whisper", base_voice),
            SpeakStyle::Spoken => base_voice,
        };
        args.push("-v".to_string());
        args.push(voice);

        args.push("-s".to_string());
        args.push(options.speech_rate.to_string());

        // espeak amplitude is 0..=200
        let amplitude = (options.volume.clamp(0.0, 1.0) * 200.0) as u32;
        args.push("-a".to_string());
        args.push(amplitude.to_string());

        args
    }
}

impl Default for EspeakProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechProvider for EspeakProvider {
    fn name(&self) -> &str {
        "espeak"
    }

    async fn is_available(&self) -> bool {
        Self::espeak_command().await.is_some()
    }

    async fn speak(
        &self,
        text: &str,
        options: &SynthesisOptions,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        let command = Self::espeak_command()
            .await
            .ok_or_else(|| TtsError::ProviderNotAvailable("espeak not installed".to_string()))?;

        let mut args = Self::build_args(options);
        args.push(text.to_string());

        debug!(target: "tts", "spawning {} for {} chars", command, text.len());
        let mut child = Command::new(command).args(&args).kill_on_drop(true).spawn()?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(TtsError::SynthesisError(format!(
                        "{} exited with {}",
                        command, status
                    )))
                }
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Err(TtsError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TtsConfig;

    #[test]
    fn spoken_args_carry_rate_and_amplitude() {
        let options = SynthesisOptions::from_config(&TtsConfig::default(), SpeakStyle::Spoken);
        let args = EspeakProvider::build_args(&options);
        assert_eq!(args, vec!["-v", "en", "-s", "180", "-a", "160"]);
    }

    #[test]
    fn whisper_style_selects_the_whisper_variant() {
        let options = SynthesisOptions::from_config(&TtsConfig::default(), SpeakStyle::Whisper);
        let args = EspeakProvider::build_args(&options);
        assert!(args.contains(&"en+whisper".to_string()));
        // Whisper volume is deliberately quieter.
        assert!(args.contains(&"70".to_string()));
    }
}
