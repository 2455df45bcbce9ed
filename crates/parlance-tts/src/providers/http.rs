//! Cloud synthesis over a vendor HTTP API, played back through rodio.
//!
//! The same provider type covers the primary neural voice, the free
//! secondary service, and the last-resort backup; only the endpoint
//! configuration differs.

use crate::error::{TtsError, TtsResult};
use crate::provider::SpeechProvider;
use crate::types::{SpeakStyle, SynthesisOptions};
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink};
use serde::Serialize;
use std::io::Cursor;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpTtsConfig {
    /// Display name used in logs and diagnostics.
    pub name: String,
    /// Synthesis endpoint returning WAV (or anything rodio decodes).
    pub endpoint: String,
    /// Bearer credential; `None` for keyless free tiers.
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: Option<&'a str>,
    rate_wpm: u32,
    style: &'a str,
}

pub struct HttpTtsProvider {
    config: HttpTtsConfig,
    client: reqwest::Client,
    tap: Option<std::sync::Arc<dyn crate::provider::AudioTap>>,
}

impl HttpTtsProvider {
    pub fn new(config: HttpTtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            tap: None,
        }
    }

    /// Route synthesized audio to an observer (the self-echo profiler)
    /// before playback.
    pub fn with_tap(mut self, tap: std::sync::Arc<dyn crate::provider::AudioTap>) -> Self {
        self.tap = Some(tap);
        self
    }

    async fn fetch_audio(&self, text: &str, options: &SynthesisOptions) -> TtsResult<Vec<u8>> {
        let request = SynthesisRequest {
            text,
            voice: options.voice.as_deref(),
            rate_wpm: options.speech_rate,
            style: match options.style {
                SpeakStyle::Spoken => "spoken",
                SpeakStyle::Whisper => "whisper",
            },
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(TtsError::SynthesisError(format!(
                "{} returned no audio",
                self.config.name
            )));
        }
        Ok(bytes.to_vec())
    }

    /// Blocking playback with cooperative cancellation between poll ticks.
    fn play_audio(audio: Vec<u8>, volume: f32, cancel: CancellationToken) -> TtsResult<()> {
        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| TtsError::AudioError(format!("no output device: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| TtsError::AudioError(format!("sink creation failed: {e}")))?;
        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| TtsError::AudioError(format!("undecodable audio: {e}")))?;

        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(source);

        while !sink.empty() {
            if cancel.is_cancelled() {
                sink.stop();
                return Err(TtsError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechProvider for HttpTtsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn speak(
        &self,
        text: &str,
        options: &SynthesisOptions,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        if cancel.is_cancelled() {
            return Err(TtsError::Cancelled);
        }

        let audio = self.fetch_audio(text, options).await?;
        debug!(
            target: "tts",
            "{}: {} bytes of audio fetched",
            self.config.name,
            audio.len()
        );

        if cancel.is_cancelled() {
            return Err(TtsError::Cancelled);
        }

        if let Some(tap) = &self.tap {
            tap.on_synthesized(&audio);
        }

        let volume = options.volume;
        let playback_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || Self::play_audio(audio, volume, playback_cancel))
            .await
            .map_err(|e| TtsError::AudioError(format!("playback task panicked: {e}")))?
    }
}
