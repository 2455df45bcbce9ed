use crate::backend::{cloud_credential, SpeechBackend, CLOUD_CREDENTIAL_ENV};
use crate::error::{SttError, SttResult};
use crate::types::{now_ms, RecognitionEvent};
use async_trait::async_trait;
use parlance_audio::{encode_wav, MicFlag, SegmentRecorder, ENGINE_SAMPLE_RATE_HZ};
use parlance_foundation::AudioError;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEFAULT_ENDPOINT: &str = "https://speech.parlance.dev/v1";

#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the vendor's streaming recognition API.
    pub endpoint: String,
    pub api_key: String,
    pub locale: String,
    /// Audio shipped per request on the continuous connection.
    pub chunk_duration: Duration,
    /// Backoff after a transient vendor error.
    pub retry_backoff: Duration,
}

impl CloudConfig {
    pub fn from_env(locale: &str) -> SttResult<Self> {
        let api_key = cloud_credential().ok_or_else(|| {
            SttError::Configuration(format!("{} is not set", CLOUD_CREDENTIAL_ENV))
        })?;
        let endpoint = std::env::var("PARLANCE_SPEECH_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            endpoint,
            api_key,
            locale: locale.to_string(),
            chunk_duration: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(1),
        })
    }
}

/// Wire shape of one recognition result line. The vendor owns voice
/// activity segmentation and emits interim results ahead of each final.
#[derive(Debug, Deserialize)]
struct WireEvent {
    text: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default = "full_confidence")]
    confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

/// Continuous cloud recognition over the vendor's streaming HTTP API.
///
/// Audio is shipped in back-to-back chunks on a long-lived client; the
/// vendor segments it server-side and answers each chunk with newline-
/// delimited interim and final results. Transient errors (network blips,
/// rate limits) are logged and retried; they never end the session.
pub struct CloudBackend {
    config: CloudConfig,
    client: reqwest::Client,
    recorder: Arc<dyn SegmentRecorder>,
    mic: MicFlag,
}

impl CloudBackend {
    pub fn new(config: CloudConfig, recorder: Arc<dyn SegmentRecorder>, mic: MicFlag) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            recorder,
            mic,
        }
    }

    async fn recognize_chunk(&self, wav: Vec<u8>) -> SttResult<Vec<RecognitionEvent>> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("chunk.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("locale", self.config.locale.clone());

        let response = self
            .client
            .post(format!("{}/recognize:stream", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        Ok(parse_event_stream(&body))
    }
}

#[async_trait]
impl SpeechBackend for CloudBackend {
    fn name(&self) -> &str {
        "cloud-streaming"
    }

    async fn run(
        &self,
        event_tx: mpsc::Sender<RecognitionEvent>,
        cancel: CancellationToken,
    ) -> SttResult<()> {
        tracing::info!(
            target: "stt",
            "cloud backend starting (endpoint: {}, locale: {})",
            self.config.endpoint,
            self.config.locale
        );

        while !cancel.is_cancelled() {
            let guard = match self.mic.try_claim() {
                Some(guard) => guard,
                None => {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    continue;
                }
            };

            let recorder = Arc::clone(&self.recorder);
            let duration = self.config.chunk_duration;
            let record_cancel = cancel.clone();
            let recorded =
                tokio::task::spawn_blocking(move || recorder.record(duration, &record_cancel))
                    .await;
            drop(guard);

            let pcm = match recorded {
                Ok(Ok(pcm)) => pcm,
                Ok(Err(AudioError::Cancelled)) => break,
                Ok(Err(e)) => {
                    tracing::warn!(target: "stt", "chunk capture failed: {}", e);
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(target: "stt", "recording task panicked: {}", e);
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
            };

            let wav = match encode_wav(&pcm, ENGINE_SAMPLE_RATE_HZ) {
                Ok(wav) => wav,
                Err(e) => {
                    tracing::warn!(target: "stt", "chunk encode failed: {}", e);
                    continue;
                }
            };

            match self.recognize_chunk(wav).await {
                Ok(events) => {
                    for event in events {
                        if event_tx.send(event).await.is_err() {
                            tracing::info!(
                                target: "stt",
                                "event receiver dropped, stopping cloud backend"
                            );
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    // Transient by policy: the session must survive vendor
                    // hiccups.
                    tracing::warn!(target: "stt", "cloud recognition error: {}", e);
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }

        tracing::info!(target: "stt", "cloud backend stopped");
        Ok(())
    }
}

/// Parse a newline-delimited result body, preserving vendor order so
/// interim events always precede their final. Unparseable lines and empty
/// transcripts are dropped.
fn parse_event_stream(body: &str) -> Vec<RecognitionEvent> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match serde_json::from_str::<WireEvent>(line) {
                Ok(wire) if !wire.text.trim().is_empty() => Some(RecognitionEvent {
                    text: wire.text,
                    is_final: wire.is_final,
                    confidence: wire.confidence.clamp(0.0, 1.0),
                    timestamp_ms: now_ms(),
                }),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(target: "stt", "skipping malformed result line: {}", e);
                    None
                }
            }
        })
        .collect()
}
